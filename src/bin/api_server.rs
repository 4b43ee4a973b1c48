use std::env;

use epsg_convert::api::create_router;
use log::info;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = env::var("EPSG_CONVERT_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let app = create_router();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind port");

    info!("epsg-convert API listening on http://{}", addr);
    info!("  GET  /api/resolve?srs=<descriptor>[&expand=false]");
    info!("  POST /api/convert (multipart/form-data: file + srs_input/srs_output/... fields)");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
