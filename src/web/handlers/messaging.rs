// /secretaria/enviar_mensagem and /secretaria/mensagens

use axum::{
    extract::State,
    response::{Html, Response},
    Extension,
};
use axum_extra::extract::Form;
use minijinja::context;
use serde::Deserialize;

use crate::entities::{member, message, ministry, Channel};
use crate::error::Result;
use crate::messaging::{self, Audience, OutgoingMessage};
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

const COMPOSE_PATH: &str = "/secretaria/enviar_mensagem";
const HISTORY_LIMIT: u32 = 100;

pub async fn compose(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let (members, ministries) = {
        let conn = state.db()?;
        (member::list_active(&conn)?, ministry::list(&conn)?)
    };
    state.templates.render(
        &ctx,
        "mensagens/enviar.html",
        context! {
            members,
            ministries,
            email_enabled => state.config.messaging.email.transport.is_enabled(),
            sms_enabled => state.config.messaging.sms.is_enabled(),
        },
    )
}

/// `membros` repeats once per checked member
#[derive(Debug, Deserialize)]
pub struct SendForm {
    pub canal: String,
    pub destino: String,
    #[serde(default)]
    pub ministerio: Option<String>,
    #[serde(default)]
    pub membros: Vec<i64>,
    #[serde(default)]
    pub assunto: String,
    pub mensagem: String,
}

impl SendForm {
    fn audience(&self) -> Result<(Channel, Audience)> {
        let channel: Channel = self.canal.parse()?;
        let audience = Audience::from_form(self.destino.trim(), self.ministerio.as_deref(), &self.membros)?;
        Ok((channel, audience))
    }
}

pub async fn send(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Form(form): Form<SendForm>,
) -> Result<Response> {
    let (channel, audience) = match form.audience() {
        Ok(parsed) => parsed,
        Err(e) => return Ok(flash::redirect(COMPOSE_PATH, Flash::danger(e.user_message()))),
    };
    let outgoing = OutgoingMessage {
        subject: form.assunto.trim().to_string(),
        body: form.mensagem.trim().to_string(),
        sent_by: ctx.user.as_ref().map(|u| u.id),
    };
    if let Err(e) = outgoing.validate(channel) {
        return Ok(flash::redirect(COMPOSE_PATH, Flash::danger(e.user_message())));
    }

    let recipients = match messaging::resolve_audience(&*state.db()?, &audience, channel) {
        Ok(recipients) => recipients,
        Err(e) if e.is_form_error() => return Ok(flash::redirect(COMPOSE_PATH, Flash::danger(e.user_message()))),
        Err(e) => return Err(e),
    };
    if recipients.is_empty() {
        return Ok(flash::redirect(
            COMPOSE_PATH,
            Flash::warning("Nenhum destinatário encontrado."),
        ));
    }

    let sender = state.sender(channel);
    let outcome = messaging::broadcast(&state.db, sender.as_ref(), &recipients, &outgoing).await?;
    let flash = if outcome.failed == 0 {
        Flash::success(outcome.flash_message())
    } else {
        Flash::warning(outcome.flash_message())
    };
    Ok(flash::redirect("/secretaria/mensagens", flash))
}

pub async fn history(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let messages = message::list_recent(&*state.db()?, HISTORY_LIMIT)?;
    state
        .templates
        .render(&ctx, "mensagens/historico.html", context! { messages })
}
