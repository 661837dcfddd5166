//! In-memory portal serving canned MetroWeb pages.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use metroweb::error::{AppError, Result};
use metroweb::models::Credentials;
use metroweb::presenter::Presenter;
use metroweb::services::{FormSubmission, Page, PageSource};

pub const BASE: &str = "https://app.inti.gob.ar";
pub const PASSWORD: &str = "secreto";

const LOGIN: &str = r#"<html><body>
<form action="/MetroWeb/ingreso.do" method="post">
  <input type="hidden" name="accion" value="ingresar">
  <table>
    <tr><td>Usuario</td><td><input type="text" name="usuario"></td></tr>
    <tr><td>Contraseña</td><td><input type="password" name="contrasena"></td></tr>
  </table>
  <input type="submit" value="Ingresar">
</form>
</body></html>"#;

/// Login page after a portal redesign renamed the password input.
const LOGIN_WITHOUT_PASSWORD: &str = r#"<html><body>
<form action="/MetroWeb/ingreso.do" method="post">
  <input type="text" name="usuario">
  <input type="text" name="token" placeholder="Código de acceso">
  <input type="submit" value="Ingresar">
</form>
</body></html>"#;

const HOME: &str = r#"<html><body><h2>Bienvenido a MetroWeb</h2>
<a href="/MetroWeb/entrarPML.do">Buscar trámites</a></body></html>"#;

const SEARCH: &str = r#"<html><body>
<form action="/MetroWeb/buscarOT.do" method="post">
  <table><tr><td>Número OT:</td><td><input type="text" name="numeroOT"></td></tr></table>
  <input type="submit" name="buscar" value="Buscar">
</form>
</body></html>"#;

const RESULTS: &str = r#"<html><body><table>
<tr><th>Trámite</th><th>Estado</th></tr>
<tr><td><a href="/MetroWeb/tramiteVPE.do?idTramite=4512">VPE 4512</a></td><td>En curso</td></tr>
</table></body></html>"#;

const UNNUMBERED_RESULTS: &str = r#"<html><body><table>
<tr><td><a href="/MetroWeb/tramiteVPE.do?idTramite=4512">Ver trámite</a></td></tr>
</table></body></html>"#;

const NO_RESULTS: &str = r#"<html><body><p>No se encontraron trámites.</p></body></html>"#;

const SUMMARY: &str = r#"<html><body>
<h2>Resumen del trámite</h2>
<table>
  <tr><td>Nro OT</td><td>307-62136</td></tr>
  <tr><td>Número:</td><td>VPE 4512</td></tr>
  <tr><td>Empresa Solicitante</td><td>Balanzas del Oeste SRL</td></tr>
  <tr><td>Usuario Representado</td><td>Acopio Norte S.A.</td></tr>
</table>
<table>
  <tr><td><a href="/MetroWeb/instrumentoDetalle.do?idInstrumento=101">Instrumento 1</a></td></tr>
  <tr><td><a href="/MetroWeb/instrumentoDetalle.do?idInstrumento=102">Instrumento 2</a></td></tr>
  <tr><td><a href="/MetroWeb/instrumentoDetalle.do?idInstrumento=101">ver otra vez</a></td></tr>
</table>
</body></html>"#;

const EMPTY_SUMMARY: &str = r#"<html><body>
<table>
  <tr><td>Nro OT</td><td>307-62136</td></tr>
  <tr><td>Número:</td><td>VPE 4512</td></tr>
  <tr><td>Empresa Solicitante</td><td>Balanzas del Oeste SRL</td></tr>
</table>
<p>El trámite no tiene instrumentos.</p>
</body></html>"#;

/// Summary with neither a "Número:" cell nor a VPE number in its text.
const UNNUMBERED_SUMMARY: &str = r#"<html><body>
<table>
  <tr><td>Empresa Solicitante</td><td>Balanzas del Oeste SRL</td></tr>
</table>
<table>
  <tr><td><a href="/MetroWeb/instrumentoDetalle.do?idInstrumento=101">Instrumento 1</a></td></tr>
</table>
</body></html>"#;

const DETAIL: &str = r#"<html><body><table>
  <tr><td>Nombre del Usuario del Instrumento</td><td>Acopio Norte S.A.</td></tr>
  <tr><td>Dirección Legal</td><td>Suyai 2632 Luján de Cuyo Mendoza</td></tr>
</table></body></html>"#;

fn instrument_page(
    street: &str,
    receptor: (&str, &str, &str, u32),
    indicador: (&str, &str, &str, u32),
) -> String {
    let section = |heading: &str, (line, code, serial, model): (&str, &str, &str, u32)| {
        format!(
            r#"<h3>{heading}</h3>
<table>
  <tr><td>Modelo - Tipo de Instrumento - Marca - Fabricante</td><td>{line}</td></tr>
  <tr><td>Código de Aprobación</td><td>{code}</td></tr>
  <tr><td>Nro de serie</td><td>{serial}</td></tr>
  <tr><td>Detalle del modelo</td><td><a href="/MetroWeb/modeloDetalle.do?idModelo={model}">ver</a></td></tr>
</table>"#
        )
    };
    format!(
        r#"<html><body>
<table><tr><td>Domicilio</td><td>{street}<br>Luján de Cuyo<br>Mendoza</td></tr></table>
{}
{}
</body></html>"#,
        section("Parte base del Instrumento", receptor),
        section("Indicador Electrónico", indicador),
    )
}

fn model_page(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(label, value)| format!("<tr><td>{}</td><td>{}</td></tr>", label, value))
        .collect();
    format!("<html><body><table>{}</table></body></html>", body)
}

/// Which portal state the fixture reproduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Work order 307-62136 with two truck scales
    TwoInstruments,
    /// The VPE lists no instruments
    NoInstruments,
    /// The search finds no VPE
    NoVpe,
    /// The VPE link and the summary carry no VPE number
    UnnumberedVpe,
    /// The login page has no password field
    LoginWithoutPassword,
}

pub struct FixturePortal {
    pages: HashMap<String, String>,
    scenario: Scenario,
    unreachable: HashSet<String>,
    pub submits: Mutex<Vec<FormSubmission>>,
    pub gets: Mutex<Vec<String>>,
}

impl FixturePortal {
    pub fn new(scenario: Scenario) -> Self {
        let mut pages = HashMap::new();
        let login = match scenario {
            Scenario::LoginWithoutPassword => LOGIN_WITHOUT_PASSWORD,
            _ => LOGIN,
        };
        pages.insert("/MetroWeb/pages/ingreso.jsp".to_string(), login.to_string());
        pages.insert("/MetroWeb/entrarPML.do".to_string(), SEARCH.to_string());
        pages.insert(
            "/MetroWeb/tramiteVPE.do?idTramite=4512".to_string(),
            "<html><body>Trámite VPE</body></html>".to_string(),
        );
        let summary = match scenario {
            Scenario::NoInstruments => EMPTY_SUMMARY,
            Scenario::UnnumberedVpe => UNNUMBERED_SUMMARY,
            _ => SUMMARY,
        };
        pages.insert("/MetroWeb/pages/tramiteVPE/resumen.jsp".to_string(), summary.to_string());
        pages.insert("/MetroWeb/pages/tramiteVPE/detalle.jsp".to_string(), DETAIL.to_string());

        pages.insert(
            "/MetroWeb/instrumentoDetalle.do?idInstrumento=101".to_string(),
            instrument_page(
                "Ruta 7 km 1040",
                ("BPC-80 - Balanza - Systel - Systel S.A.", "R-11", "REC-1", 1),
                ("PX-1 - Indicador - Pesex - Pesex SRL", "I-22", "IND-9", 2),
            ),
        );
        pages.insert(
            "/MetroWeb/instrumentoDetalle.do?idInstrumento=102".to_string(),
            instrument_page(
                "Ruta 40 km 3200",
                ("K-3 - Balanza - Kretz - Kretz SA", "R-12", "REC-2", 3),
                ("PX-1 - Indicador - Pesex - Pesex SRL", "I-22", "IND-10", 2),
            ),
        );

        pages.insert(
            "/MetroWeb/modeloDetalle.do?idModelo=1".to_string(),
            model_page(&[
                ("Modelo Aprobado", "BPC-80"),
                ("Marca", "Systel"),
                ("Fabricante/Importador", "Systel S.A."),
                ("País de Origen", "Argentina"),
                ("N° Disposición", "1234/97"),
                ("Fecha de Aprobación", "22/04/1997"),
                ("Máximo", "80000 kg"),
                ("Mínimo", "400 kg"),
                ("e", "50 kg"),
                ("dd=dt", "20 kg"),
                ("Clase", "III"),
                ("Código Aprobación", "A-0097"),
            ]),
        );
        pages.insert(
            "/MetroWeb/modeloDetalle.do?idModelo=2".to_string(),
            model_page(&[
                ("Modelo Aprobado", "PX-1"),
                ("Marca", "Pesex"),
                ("Fabricante/Importador", "Pesex SRL"),
                ("País de Origen", "Argentina"),
                ("N° Disposición", "77/2005"),
                ("Fecha de Aprobación", "2005-03-09"),
                ("Código Aprobación", "I-0022"),
            ]),
        );
        pages.insert(
            "/MetroWeb/modeloDetalle.do?idModelo=3".to_string(),
            model_page(&[
                ("Modelo", "K-3"),
                ("Marca", "Kretz"),
                ("Fabricante", "Kretz SA"),
                ("País Origen", "Argentina"),
                ("e", "10 kg"),
                ("Fecha Aprobación", "N/D"),
            ]),
        );

        Self {
            pages,
            scenario,
            unreachable: HashSet::new(),
            submits: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
        }
    }

    /// Make a page fail to load.
    pub fn unreachable(mut self, path: &str) -> Self {
        self.unreachable.insert(path.to_string());
        self
    }

    pub fn get_count(&self, path: &str) -> usize {
        let url = format!("{}{}", BASE, path);
        self.gets.lock().unwrap().iter().filter(|u| **u == url).count()
    }

    fn path_of(url: &str) -> String {
        url.strip_prefix(BASE).unwrap_or(url).to_string()
    }
}

#[async_trait]
impl PageSource for FixturePortal {
    async fn get(&self, url: &str) -> Result<Page> {
        self.gets.lock().unwrap().push(url.to_string());
        let path = Self::path_of(url);
        if self.unreachable.contains(&path) {
            return Err(AppError::navigation(url, "timed out"));
        }
        match self.pages.get(&path) {
            Some(body) => Ok(Page::new(url, body.clone())),
            None => Err(AppError::navigation(url, "404 Not Found")),
        }
    }

    async fn submit(&self, form: &FormSubmission) -> Result<Page> {
        self.submits.lock().unwrap().push(form.clone());
        let body = match Self::path_of(&form.action).as_str() {
            "/MetroWeb/ingreso.do" if form.get("contrasena") == Some(PASSWORD) => HOME,
            "/MetroWeb/ingreso.do" => LOGIN,
            "/MetroWeb/buscarOT.do" if self.scenario == Scenario::NoVpe => NO_RESULTS,
            "/MetroWeb/buscarOT.do" if self.scenario == Scenario::UnnumberedVpe => UNNUMBERED_RESULTS,
            "/MetroWeb/buscarOT.do" => RESULTS,
            other => return Err(AppError::navigation(other, "unexpected form")),
        };
        Ok(Page::new(form.action.clone(), body))
    }
}

/// Presenter that records progress calls.
#[derive(Default)]
pub struct RecordingPresenter {
    pub progress: Mutex<Vec<(usize, usize)>>,
    pub messages: Mutex<Vec<String>>,
}

impl Presenter for RecordingPresenter {
    fn log(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn progress(&self, current: usize, total: usize) {
        self.progress.lock().unwrap().push((current, total));
    }

    fn prompt_credentials(&self) -> Result<Credentials> {
        Ok(Credentials::new("inspector", PASSWORD))
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("inspector", PASSWORD)
}

pub fn wrong_credentials() -> Credentials {
    Credentials::new("inspector", "otra")
}
