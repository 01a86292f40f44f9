// Page templates, compiled into the binary

use axum::response::Html;
use minijinja::{context, Environment, Value};

use super::guard::RequestContext;
use crate::error::Result;
use crate::reports;

macro_rules! page {
    ($name:literal) => {
        ($name, include_str!(concat!("../../templates/", $name)))
    };
}

const PAGES: &[(&str, &str)] = &[
    page!("base.html"),
    page!("publico/index.html"),
    page!("publico/eventos.html"),
    page!("publico/ministerios.html"),
    page!("publico/sobre.html"),
    page!("publico/contato.html"),
    page!("auth/login.html"),
    page!("secretaria/painel.html"),
    page!("membros/lista.html"),
    page!("membros/form.html"),
    page!("membros/importar.html"),
    page!("ministerios/lista.html"),
    page!("ministerios/form.html"),
    page!("eventos/lista.html"),
    page!("eventos/form.html"),
    page!("agenda/lista.html"),
    page!("agenda/form.html"),
    page!("financeiro/painel.html"),
    page!("financeiro/extrato.html"),
    page!("financeiro/editar.html"),
    page!("financeiro/configuracao.html"),
    page!("financeiro/custos.html"),
    page!("usuarios/lista.html"),
    page!("usuarios/form.html"),
    page!("mensagens/enviar.html"),
    page!("mensagens/historico.html"),
    page!("conta/minha_conta.html"),
];

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        reports::add_ledger_filters(&mut env);
        for (name, source) in PAGES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render `name` with the page values plus `current_user` and `flash`
    pub fn render(&self, ctx: &RequestContext, name: &str, page: Value) -> Result<Html<String>> {
        let html = self.env.get_template(name)?.render(context! {
            current_user => ctx.user,
            flash => ctx.flash,
            ..page
        })?;
        Ok(Html(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::flash::Flash;

    #[test]
    fn test_all_pages_compile() {
        let templates = Templates::new().unwrap();
        for (name, _) in PAGES {
            assert!(templates.env.get_template(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_flash_is_rendered() {
        let templates = Templates::new().unwrap();
        let ctx = RequestContext {
            user: None,
            flash: Some(Flash::danger("Credenciais inválidas!")),
        };
        let html = templates.render(&ctx, "auth/login.html", context! {}).unwrap();
        assert!(html.0.contains("Credenciais inválidas!"));
        assert!(html.0.contains("alert-danger"));
    }
}
