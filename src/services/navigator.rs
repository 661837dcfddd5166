// src/services/navigator.rs

//! Portal navigation from login to the list of instrument links.
//!
//! The session walks a fixed sequence of pages:
//! login, work order search, VPE, trámite summary, trámite detail.
//! A missing field or link on the way is fatal, as is a summary without a
//! VPE number. The detail page is the exception and degrades to empty
//! owner data.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Credentials, ExtractionReport, Outcome, Tramite, WorkOrder};
use crate::presenter::Presenter;
use crate::services::cells::{CellReader, cell_text};
use crate::services::forms::{self, FormSubmission};
use crate::services::portal::{Page, PageSource};
use crate::utils::{console, only_digits, resolve_url};

/// Steps shown while navigating.
const TOTAL_STEPS: usize = 5;

static VPE_IN_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)vpe\s*0*?(\d+)").expect("vpe regex"));

/// State reached after navigation: trámite data and instrument links.
#[derive(Debug, Clone)]
pub struct Session {
    pub tramite: Tramite,
    pub instrument_links: Vec<String>,
}

/// Owner data from the trámite detail page.
#[derive(Debug, Clone, Default)]
struct OwnerDetail {
    owner_name: String,
    legal_address: String,
    instrument_ids: Vec<String>,
}

/// Drives one portal session.
pub struct PortalNavigator<'a> {
    config: &'a Config,
    source: &'a dyn PageSource,
    presenter: &'a dyn Presenter,
}

impl<'a> PortalNavigator<'a> {
    pub fn new(config: &'a Config, source: &'a dyn PageSource, presenter: &'a dyn Presenter) -> Self {
        Self {
            config,
            source,
            presenter,
        }
    }

    /// Log in, open the work order's VPE and enumerate its instruments.
    pub async fn open(
        &self,
        credentials: &Credentials,
        work_order: &WorkOrder,
        report: &mut ExtractionReport,
    ) -> Result<Session> {
        self.announce(1, "Connecting to MetroWeb");
        self.login(credentials).await?;
        self.presenter.log("Session started");

        self.announce(2, &format!("Searching work order {}", work_order));
        let results = self.search(work_order).await?;

        self.announce(3, "Opening VPE");
        let link_vpe = self.open_vpe(&results, work_order).await?;
        self.presenter.log(&format!("VPE found: {}", link_vpe));

        self.announce(4, "Reading trámite summary");
        let summary = self.source.get(&self.portal_url(&self.config.portal.summary_path)).await?;
        let (mut tramite, mut instrument_links) = self.read_summary(&summary, work_order, &link_vpe);
        if !tramite.is_identified() {
            return Err(AppError::AbortedRun(format!(
                "the VPE number of work order {} could not be read (OT '{}', VPE '{}')",
                work_order, tramite.work_order, tramite.vpe
            )));
        }

        self.announce(5, "Reading owner details");
        let detail = self.read_detail().await.record(report, "trámite detail");
        tramite.owner_name = detail.owner_name;
        tramite.legal_address = detail.legal_address;

        if instrument_links.is_empty() && !detail.instrument_ids.is_empty() {
            log::info!(
                "No instrument links on the summary; using {} ids from the detail page",
                detail.instrument_ids.len()
            );
            instrument_links = detail
                .instrument_ids
                .iter()
                .map(|id| self.config.portal.instrument_url(id))
                .collect();
        }

        console::summary(
            "Trámite",
            &[
                ("Número de O.T.", tramite.work_order.clone()),
                ("VPE Nº", tramite.vpe.clone()),
                ("Empresa", tramite.company.clone()),
                ("Propietario", tramite.owner().to_string()),
                ("Instrumentos", instrument_links.len().to_string()),
            ],
        );

        Ok(Session {
            tramite,
            instrument_links,
        })
    }

    fn announce(&self, step: usize, message: &str) {
        console::step(step, TOTAL_STEPS, message);
        self.presenter.log(message);
    }

    fn portal_url(&self, path: &str) -> String {
        self.config.portal.url(path)
    }

    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let selectors = &self.config.portal.selectors;
        let page = self.source.get(&self.portal_url(&self.config.portal.login_path)).await?;

        let form = {
            let doc = page.document();
            let user = forms::find_first(&doc, &selectors.user_field)?
                .ok_or_else(|| AppError::LoginFieldNotFound("usuario".into()))?;
            let password = forms::find_first(&doc, &selectors.password_field)?
                .ok_or_else(|| AppError::LoginFieldNotFound("contraseña".into()))?;

            let user_name = field_name(user.value().attr("name"), "usuario")?;
            let password_name = field_name(password.value().attr("name"), "contraseña")?;

            let mut form = FormSubmission::for_field(&page.url, user)?;
            form.set(&user_name, &credentials.username);
            form.set(&password_name, &credentials.password);
            if let Some(button) = forms::find_first(&doc, &selectors.login_submit)? {
                form.press(button);
            }
            form
        };

        let landing = self.source.submit(&form).await?;
        let still_on_login = {
            let doc = landing.document();
            forms::find_first(&doc, &[r#"input[type="password"]"#.to_string()])?.is_some()
        };
        if still_on_login {
            return Err(AppError::AuthenticationFailed);
        }
        Ok(())
    }

    async fn search(&self, work_order: &WorkOrder) -> Result<Page> {
        let selectors = &self.config.portal.selectors;
        let page = self.source.get(&self.portal_url(&self.config.portal.search_path)).await?;

        let form = {
            let doc = page.document();
            let field = match forms::find_first(&doc, &selectors.work_order_field)? {
                Some(field) => Some(field),
                None => forms::input_after_text(&doc, &selectors.work_order_field_labels),
            }
            .ok_or_else(|| AppError::navigation("work order search", "search field not found"))?;
            let name = field
                .value()
                .attr("name")
                .ok_or_else(|| AppError::navigation("work order search", "search field has no name"))?
                .to_string();

            let mut form = FormSubmission::for_field(&page.url, field)?;
            form.set(&name, work_order.as_str());
            if let Some(button) = forms::find_first(&doc, &selectors.search_submit)? {
                form.press(button);
            }
            form
        };

        self.source.submit(&form).await
    }

    /// Follow the first VPE link; returns the digits of its text.
    async fn open_vpe(&self, results: &Page, work_order: &WorkOrder) -> Result<String> {
        let (href, vpe) = {
            let doc = results.document();
            let marker = &self.config.portal.vpe_link_marker;
            let selector = Selector::parse(&format!(r#"a[href*="{}"]"#, marker))
                .map_err(|e| AppError::selector(marker, e))?;
            let link = doc
                .select(&selector)
                .next()
                .ok_or_else(|| AppError::VpeNotFound(work_order.to_string()))?;
            (
                link.value().attr("href").unwrap_or_default().to_string(),
                only_digits(&cell_text(link, false)),
            )
        };

        let base = Url::parse(&results.url)?;
        self.source.get(&resolve_url(&base, &href)).await?;
        Ok(vpe)
    }

    fn read_summary(&self, page: &Page, work_order: &WorkOrder, link_vpe: &str) -> (Tramite, Vec<String>) {
        let labels = &self.config.labels;
        let doc = page.document();
        let reader = CellReader::new(&doc);

        let mut tramite = Tramite {
            work_order: reader.read_cell_any(&labels.work_order, false),
            company: reader.read_cell_any(&labels.company, false),
            represented_user: reader.read_cell_any(&labels.represented_user, false),
            ..Tramite::default()
        };
        if tramite.work_order.is_empty() {
            tramite.work_order = work_order.to_string();
        }

        tramite.vpe = VPE_IN_PAGE_RE
            .captures(&page.body)
            .map(|caps| caps[1].to_string())
            .unwrap_or_default();
        if tramite.vpe.is_empty() {
            tramite.vpe = only_digits(&reader.read_cell_any(&labels.vpe_number, false));
        }
        if tramite.vpe.is_empty() {
            tramite.vpe = link_vpe.to_string();
        }

        let links = match Url::parse(&page.url) {
            Ok(base) => {
                let mut seen = HashSet::new();
                reader
                    .links_containing(&self.config.portal.instrument_link_marker)
                    .into_iter()
                    .map(|(_, href)| resolve_url(&base, &href))
                    .filter(|url| seen.insert(url.clone()))
                    .collect()
            }
            Err(e) => {
                log::warn!("Summary page URL {} is invalid: {}", page.url, e);
                Vec::new()
            }
        };

        (tramite, links)
    }

    async fn read_detail(&self) -> Outcome<OwnerDetail> {
        let url = self.portal_url(&self.config.portal.detail_path);
        let page = match self.source.get(&url).await {
            Ok(page) => page,
            Err(e) => return Outcome::degraded(OwnerDetail::default(), e.to_string()),
        };

        let labels = &self.config.labels;
        let doc = page.document();
        let reader = CellReader::new(&doc);

        let instrument_ids = match Selector::parse(&self.config.portal.selectors.instrument_id_input) {
            Ok(selector) => doc
                .select(&selector)
                .filter_map(|input| input.value().attr("value"))
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                log::warn!("Invalid instrument id selector: {}", e);
                Vec::new()
            }
        };

        Outcome::Resolved(OwnerDetail {
            owner_name: reader.read_cell_any(&labels.owner_name, false),
            legal_address: reader.read_cell_any(&labels.legal_address, false),
            instrument_ids,
        })
    }
}

fn field_name(name: Option<&str>, field: &str) -> Result<String> {
    match name {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(AppError::LoginFieldNotFound(format!("{} (no name attribute)", field))),
    }
}
