#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use hoymiles_rs::model::PresentationSnapshot;
use hoymiles_rs::settings::{self, Settings};
use hoymiles_rs::source::Source;
use hoymiles_rs::watermark::FileStore;
use hoymiles_rs::{Collector, Error, FetchCycle};
use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use rocket::State;

mod metrics;
mod page;

/// Structure containing state for request handlers.
pub struct StateData {
    collector: Collector,
    /// Gauge upper bound for the HTML page
    max_power: f64,
}

impl StateData {
    fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let source = Source::from_settings(settings)?;
        let store = FileStore::from_settings(settings);

        Ok(StateData {
            collector: Collector::new(source, Box::new(store)),
            max_power: settings.max_power,
        })
    }

    /// Runs one fetch cycle and publishes it to the metrics registry.
    async fn cycle(&self) -> FetchCycle {
        let cycle = self.collector.collect().await;
        metrics::observe(&cycle);
        cycle
    }
}

#[get("/")]
async fn index_route(state: &State<StateData>) -> RawHtml<String> {
    let cycle = state.cycle().await;
    RawHtml(page::render(&cycle.snapshot, state.max_power))
}

#[get("/snapshot")]
async fn snapshot_route(state: &State<StateData>) -> Json<PresentationSnapshot> {
    Json(state.cycle().await.snapshot)
}

#[get("/metrics")]
async fn metrics_route(state: &State<StateData>) -> Result<String, Error> {
    state.cycle().await;
    metrics::read()
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let settings = settings::read_settings()?;
    log::info!(
        "source: {:?}, dtu_url: {}, store: {} ({:?})",
        settings.source,
        settings.dtu_url,
        settings.store_path,
        settings.watermark_policy
    );
    let state = StateData::from_settings(&settings)?;

    let _rocket = rocket::build()
        .manage(state)
        .mount("/", routes![index_route, snapshot_route, metrics_route])
        .launch()
        .await?;

    Ok(())
}
