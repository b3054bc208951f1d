use crate::web::{routes, WebState};
use actix_web::{web, App, HttpServer};

pub async fn run_server(state: WebState, bind_address: &str) -> std::io::Result<()> {
    tracing::info!("🌐 Management API listening on http://{}", bind_address);
    tracing::info!(
        "📁 Configs: {}, outputs: {}",
        state.paths.config_dir.display(),
        state.paths.output_dir.display()
    );
    if state.airtable.is_none() {
        tracing::warn!("⚠️ AIRTABLE_API_KEY not set: metadata lookup and config scaffolding disabled");
    }

    let data = web::Data::new(state);

    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes::configure))
        .bind(bind_address)?
        .run()
        .await
}
