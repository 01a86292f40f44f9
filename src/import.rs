// 📥 Member CSV Import
//
// Header-addressed columns:
//   nome,email,celular,data_nascimento,data_batismo,ministerio,endereco,
//   cep,bairro,cidade,estado,conjuge,estado_civil,batizado
//
// Best-effort: a bad row is logged and counted, the rest are committed
// together in one transaction.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::entities::{member, MemberInput, MemberStatus};
use crate::error::{Error, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DEFAULT_CITY: &str = "Macae";
const DEFAULT_STATE: &str = "RJ";

/// One CSV line as written by the office spreadsheet; missing columns are blank
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MemberRow {
    nome: String,
    email: String,
    celular: String,
    data_nascimento: String,
    data_batismo: String,
    ministerio: String,
    endereco: String,
    cep: String,
    bairro: String,
    cidade: String,
    estado: String,
    conjuge: String,
    estado_civil: String,
    batizado: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based line in the file (header is line 1)
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    fn reject(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        warn!(line, error = %message, "member row rejected");
        self.skipped += 1;
        self.errors.push(RowError { line, message });
    }
}

/// `DD/MM/YYYY`; anything not exactly 10 characters long is treated as empty
fn parse_br_date(value: &str, column: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.chars().count() != 10 {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .map(Some)
        .map_err(|_| Error::validation(format!("{column} inválida: {value}")))
}

/// First non-empty number of a `|`-separated list
fn first_mobile(value: &str) -> String {
    value
        .split('|')
        .map(str::trim)
        .find(|number| !number.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl MemberRow {
    fn into_input(self) -> Result<MemberInput> {
        let name = self.nome.trim();
        if name.is_empty() {
            return Err(Error::validation("nome em branco"));
        }

        Ok(MemberInput {
            email: self.email.trim().to_string(),
            mobile: first_mobile(&self.celular),
            birth_date: parse_br_date(&self.data_nascimento, "data_nascimento")?,
            baptism_date: parse_br_date(&self.data_batismo, "data_batismo")?,
            marital_status: self.estado_civil.trim().to_lowercase(),
            baptized: self.batizado.trim().eq_ignore_ascii_case("sim"),
            ministry: self.ministerio.trim().to_string(),
            address: self.endereco.trim().to_string(),
            cep: self.cep.trim().to_string(),
            neighborhood: self.bairro.trim().to_string(),
            city: or_default(&self.cidade, DEFAULT_CITY),
            state: or_default(&self.estado, DEFAULT_STATE),
            spouse: self.conjuge.trim().to_string(),
            status: MemberStatus::Active,
            ..MemberInput::named(name)
        })
    }
}

/// Import every acceptable row from `source`
pub fn import_members<R: Read>(conn: &mut Connection, mut source: R) -> Result<ImportReport> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    let data = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let mut report = ImportReport::default();
    let tx = conn.transaction()?;

    for (index, result) in reader.deserialize::<MemberRow>().enumerate() {
        let line = index + 2; // 1-indexed + header row

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                report.reject(line, e.to_string());
                continue;
            }
        };

        match row.into_input().and_then(|input| member::insert(&tx, &input)) {
            Ok(_) => report.imported += 1,
            Err(e) => report.reject(line, e.to_string()),
        }
    }

    tx.commit()?;
    info!(
        imported = report.imported,
        skipped = report.skipped,
        "member import finished"
    );
    Ok(report)
}

pub fn import_members_file(conn: &mut Connection, path: &Path) -> Result<ImportReport> {
    let file = std::fs::File::open(path)?;
    import_members(conn, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use std::io::Write;

    const HEADER: &str = "nome,email,celular,data_nascimento,data_batismo,ministerio,endereco,cep,bairro,cidade,estado,conjuge,estado_civil,batizado";

    fn run(body: &str) -> (Connection, ImportReport) {
        let mut conn = test_connection();
        let csv = format!("{HEADER}\n{body}");
        let report = import_members(&mut conn, csv.as_bytes()).unwrap();
        (conn, report)
    }

    #[test]
    fn test_full_row() {
        let (conn, report) = run(
            "Maria Souza,maria@x.org,22999990000|22988880000,05/03/1980,10/10/2000,Louvor,Rua A 1,27900-000,Centro,,,José,CASADA,Sim\n",
        );
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 0);

        let members = member::list(&conn).unwrap();
        let maria = &members[0];
        assert_eq!(maria.mobile, "22999990000");
        assert_eq!(maria.birth_date, NaiveDate::from_ymd_opt(1980, 3, 5));
        assert_eq!(maria.baptism_date, NaiveDate::from_ymd_opt(2000, 10, 10));
        assert_eq!(maria.marital_status, "casada");
        assert!(maria.baptized);
        assert_eq!(maria.city, "Macae");
        assert_eq!(maria.state, "RJ");
        assert_eq!(maria.spouse, "José");
    }

    #[test]
    fn test_short_birth_date_is_null() {
        let (conn, report) = run("Pedro,,,5/3/1980,,,,,,Niterói,RJ,,solteiro,nao\n");
        assert_eq!(report.imported, 1);

        let pedro = &member::list(&conn).unwrap()[0];
        assert_eq!(pedro.birth_date, None);
        assert!(!pedro.baptized);
        assert_eq!(pedro.city, "Niterói");
    }

    #[test]
    fn test_bad_rows_are_skipped_and_rest_committed() {
        let (conn, report) = run(concat!(
            "Ana,,,,,,,,,,,,,\n",
            ",sem-nome@x.org,,,,,,,,,,,,\n",
            "Bruno,,,31/02/1990,,,,,,,,,,\n",
            "Carla,,,,,,,,,,,,,sim\n",
        ));

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.errors[0].line, 3);
        assert_eq!(report.errors[1].line, 4);
        assert_eq!(member::count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_bom_and_missing_columns() {
        let mut conn = test_connection();
        let csv = "\u{FEFF}nome,celular\nDiego, | 21977776666\n";
        let report = import_members(&mut conn, csv.as_bytes()).unwrap();
        assert_eq!(report.imported, 1);

        let diego = &member::list(&conn).unwrap()[0];
        assert_eq!(diego.name, "Diego");
        assert_eq!(diego.mobile, "21977776666");
        assert_eq!(diego.city, "Macae");
    }

    #[test]
    fn test_import_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "Elisa,elisa@x.org,,,,Infantil,,,,,,,,").unwrap();

        let mut conn = test_connection();
        let report = import_members_file(&mut conn, file.path()).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(member::list_by_ministry(&conn, "Infantil").unwrap().len(), 1);
    }
}
