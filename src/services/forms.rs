// src/services/forms.rs

//! HTML form handling for the login and search pages.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::services::cells::normalize;
use crate::utils::resolve_url;

static CONTROLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input, select, textarea").expect("controls selector"));
static OPTIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").expect("option selector"));
static INPUTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input").expect("input selector"));

/// HTTP method of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A form ready to be sent: resolved action, method and field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub action: String,
    pub method: Method,
    pub fields: Vec<(String, String)>,
}

impl FormSubmission {
    /// Build the submission for the form that owns `field`.
    ///
    /// Collects every successful control the way a browser would, except
    /// submit buttons, which are added with [`press`](Self::press).
    pub fn for_field(page_url: &str, field: ElementRef<'_>) -> Result<Self> {
        let base = Url::parse(page_url)?;

        let Some(form) = field
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "form")
        else {
            log::debug!("Field has no enclosing form; posting it to {}", page_url);
            let mut submission = Self {
                action: page_url.to_string(),
                method: Method::Post,
                fields: Vec::new(),
            };
            if let Some(name) = field.value().attr("name") {
                submission.set(name, field.value().attr("value").unwrap_or(""));
            }
            return Ok(submission);
        };

        let action = match form.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => resolve_url(&base, action),
            _ => page_url.to_string(),
        };
        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("get") => Method::Get,
            _ => Method::Post,
        };

        let fields = form.select(&CONTROLS).filter_map(control_value).collect();
        Ok(Self {
            action,
            method,
            fields,
        })
    }

    /// Set a field, replacing an existing value.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Include a submit button's name and value, as clicking it would.
    pub fn press(&mut self, button: ElementRef<'_>) {
        if let Some(name) = button.value().attr("name") {
            let value = button.value().attr("value").unwrap_or("");
            self.set(name, value);
        }
    }
}

/// Value a control contributes to the submission, if any.
fn control_value(control: ElementRef<'_>) -> Option<(String, String)> {
    let element = control.value();
    let name = element.attr("name")?.to_string();
    if name.is_empty() || element.attr("disabled").is_some() {
        return None;
    }

    match element.name() {
        "input" => {
            let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
            match kind.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => None,
                "checkbox" | "radio" => element
                    .attr("checked")
                    .map(|_| (name, element.attr("value").unwrap_or("on").to_string())),
                _ => Some((name, element.attr("value").unwrap_or("").to_string())),
            }
        }
        "select" => {
            let options: Vec<ElementRef<'_>> = control.select(&OPTIONS).collect();
            let chosen = options
                .iter()
                .find(|o| o.value().attr("selected").is_some())
                .or_else(|| options.first())?;
            let value = chosen
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| normalize(&chosen.text().collect::<String>()));
            Some((name, value))
        }
        "textarea" => Some((name, control.text().collect())),
        _ => None,
    }
}

/// First element matching any selector variant, in variant order.
pub fn find_first<'a>(document: &'a Html, variants: &[String]) -> Result<Option<ElementRef<'a>>> {
    for variant in variants {
        let selector = Selector::parse(variant).map_err(|e| AppError::selector(variant, e))?;
        if let Some(element) = document.select(&selector).next() {
            log::debug!("Matched selector variant {}", variant);
            return Ok(Some(element));
        }
    }
    Ok(None)
}

/// First text input following an element whose text contains one of the
/// labels.
pub fn input_after_text<'a>(document: &'a Html, labels: &[String]) -> Option<ElementRef<'a>> {
    let wanted: Vec<String> = labels.iter().map(|l| normalize(l)).collect();

    let mut label_seen = false;
    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let text = normalize(text);
            if wanted.iter().any(|w| !w.is_empty() && text.contains(w.as_str())) {
                label_seen = true;
            }
            continue;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if label_seen && INPUTS.matches(&element) {
            let kind = element.value().attr("type").unwrap_or("text");
            if kind.eq_ignore_ascii_case("text") || kind.is_empty() {
                return Some(element);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: &str = r#"
        <html><body>
          <form action="/MetroWeb/ingreso.do" method="post">
            <input type="hidden" name="accion" value="login">
            <input type="text" name="usuario">
            <input type="password" name="contrasena">
            <input type="checkbox" name="recordar" value="si">
            <select name="perfil"><option value="1">A</option><option value="2" selected>B</option></select>
            <input type="submit" name="btn" value="Ingresar">
          </form>
        </body></html>
    "#;

    #[test]
    fn submission_collects_hidden_and_default_fields() {
        let doc = Html::parse_document(LOGIN);
        let field = find_first(&doc, &[r#"input[name="usuario"]"#.to_string()])
            .unwrap()
            .unwrap();
        let mut form =
            FormSubmission::for_field("https://app.inti.gob.ar/MetroWeb/pages/ingreso.jsp", field).unwrap();

        assert_eq!(form.action, "https://app.inti.gob.ar/MetroWeb/ingreso.do");
        assert_eq!(form.method, Method::Post);
        assert_eq!(form.get("accion"), Some("login"));
        assert_eq!(form.get("perfil"), Some("2"));
        assert_eq!(form.get("recordar"), None);
        assert_eq!(form.get("btn"), None);

        form.set("usuario", "inspector");
        let button = find_first(&doc, &[r#"input[value="Ingresar"]"#.to_string()])
            .unwrap()
            .unwrap();
        form.press(button);
        assert_eq!(form.get("usuario"), Some("inspector"));
        assert_eq!(form.get("btn"), Some("Ingresar"));
    }

    #[test]
    fn selector_variants_are_tried_in_order() {
        let doc = Html::parse_document(LOGIN);
        let variants = vec![
            r#"input[name="user"]"#.to_string(),
            "input#usuario".to_string(),
            r#"input[type="text"]"#.to_string(),
        ];
        let found = find_first(&doc, &variants).unwrap().unwrap();
        assert_eq!(found.value().attr("name"), Some("usuario"));
        assert!(find_first(&doc, &[r#"input[name="x"]"#.to_string()]).unwrap().is_none());
        assert!(find_first(&doc, &["input[[".to_string()]).is_err());
    }

    #[test]
    fn input_is_found_after_label_text() {
        let doc = Html::parse_document(
            r#"<html><body><input type="text" name="antes">
               <table><tr><td>Número OT:</td><td><input name="campoOt"></td></tr></table>
               </body></html>"#,
        );
        let found = input_after_text(&doc, &["Número OT".to_string()]).unwrap();
        assert_eq!(found.value().attr("name"), Some("campoOt"));
    }
}
