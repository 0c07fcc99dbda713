use anyhow::Result;
use rentman::{Client, DEFAULT_BATCH_SIZE, Table};

const START_DATE: &str = "2025-01-01";
const END_DATE: &str = "2025-12-31";

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure authentication via env vars, a `.env` file or `.rentmanrc`.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let client = Client::from_env()?.with_debug(true);

    let mut contacts = client.fetch_and_normalize("contacts");
    let mut persons = client.fetch_and_normalize("contactpersons");
    let crew = client.fetch_and_normalize("crew");

    persons.resolve_column("creator", &crew, "displayname", "id");
    persons.resolve_column("contact", &contacts, "displayname", "id");
    contacts.resolve_column("creator", &crew, "displayname", "id");
    contacts.resolve_column("default_person", &persons, "displayname", "id");

    let groups = client.fetch_and_normalize(&format!(
        "projectfunctiongroups?fields=id,project&planperiod_start[gte]={}&planperiod_end[lte]={}",
        START_DATE, END_DATE
    ));
    let project_ids = groups.ids_csv("project");

    // Project details only come back in full when fetched one at a time.
    let projects = Table::concat(
        project_ids
            .split(',')
            .filter(|id| !id.is_empty())
            .map(|id| client.fetch_and_normalize(&format!("projects/{}", id))),
    );

    let mut costs = client.batch_fetch_and_normalize("costs?project=", &project_ids, DEFAULT_BATCH_SIZE);
    costs.strip_timezones();

    println!(
        "{} contacts, {} contact persons, {} crew members",
        contacts.len(),
        persons.len(),
        crew.len()
    );
    println!("{} projects, {} cost lines", projects.len(), costs.len());
    if let Some(first) = projects.row(0) {
        if let Some(number) = first.get("number") {
            println!("first project number: {}", number);
        }
    }
    if !costs.is_empty() {
        println!("{}", costs.head(5).to_pretty_json()?);
    }

    Ok(())
}
