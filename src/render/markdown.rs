use std::sync::OnceLock;

use minijinja::{Environment, context};

use crate::entities::registry::RegistryMatch;
use crate::entities::report::Report;
use crate::error::DrugBriefError;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(serde::Serialize)]
struct LookupRow<'a> {
    product_name: &'a str,
    registration_number: Option<&'a str>,
    ingredients: &'a [String],
}

fn env() -> Result<&'static Environment<'static>, DrugBriefError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.add_template("report.md.j2", include_str!("../../templates/report.md.j2"))?;
    env.add_template(
        "registry_lookup.md.j2",
        include_str!("../../templates/registry_lookup.md.j2"),
    )?;
    env.add_template(
        "side_effects.md.j2",
        include_str!("../../templates/side_effects.md.j2"),
    )?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| DrugBriefError::Api {
        api: "render".into(),
        message: "Markdown environment initialization failed".into(),
    })
}

pub fn report_markdown(report: &Report) -> Result<String, DrugBriefError> {
    let tmpl = env()?.get_template("report.md.j2")?;
    let components = report
        .components
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>();
    Ok(tmpl.render(context! {
        drug_name => &report.drug_name,
        product_name => &report.product_name,
        registration_number => &report.registration_number,
        components => components,
        side_effects => &report.side_effects,
        ai_summary => &report.ai_summary,
        timestamp => &report.timestamp,
    })?)
}

pub fn registry_lookup_markdown(
    query: &str,
    matches: &[RegistryMatch],
) -> Result<String, DrugBriefError> {
    let tmpl = env()?.get_template("registry_lookup.md.j2")?;
    let records = matches
        .iter()
        .map(|m| LookupRow {
            product_name: &m.record.product_name,
            registration_number: m.record.registration_number.as_deref(),
            ingredients: &m.ingredients,
        })
        .collect::<Vec<_>>();
    Ok(tmpl.render(context! {
        query => query,
        records => records,
    })?)
}

pub fn side_effects_markdown(
    ingredients: &[String],
    side_effects: &[String],
) -> Result<String, DrugBriefError> {
    let tmpl = env()?.get_template("side_effects.md.j2")?;
    Ok(tmpl.render(context! {
        ingredients => ingredients,
        side_effects => side_effects,
    })?)
}
