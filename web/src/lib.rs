use clap::Parser;
use mines_core::{ClientConfig, DEFAULT_TABLE_ID};
use wasm_bindgen::prelude::*;

mod app;
mod history;
mod storage;
mod timer;
mod transport;
mod view;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// Table server WebSocket endpoint
    #[arg(long, default_value = "ws://localhost:8080/ws")]
    server: String,

    /// Table to join
    #[arg(long, default_value = DEFAULT_TABLE_ID)]
    table: String,

    /// Round history endpoint, history is hidden without one
    #[arg(long)]
    history: Option<String>,

    /// Bearer token for the history endpoint
    #[arg(long)]
    token: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            table_id: self.table.clone(),
            request_timeout_ms: self.timeout.unwrap_or(defaults.request_timeout_ms),
            ..defaults
        }
    }
}

#[wasm_bindgen(start)]
pub fn run_app() -> Result<(), JsValue> {
    use gloo::utils::{document, window};

    #[cfg(feature = "console_error_panic_hook")]
    {
        console_error_panic_hook::set_once();
    }

    let location_hash = window().location().hash().unwrap_or_default();
    let args = Args::try_parse_from(location_hash.split(['#', '&']))
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    if let Some(log_level) = args.verbose.log_level() {
        console_log::init_with_level(log_level).map_err(|err| JsValue::from_str(&err.to_string()))?;
    }
    log::debug!("table: {}, server: {}", args.table, args.server);

    let root = document()
        .get_element_by_id("game")
        .ok_or_else(|| JsValue::from_str("Could not find id=\"game\" element"))?;

    let props = app::AppProps {
        config: args.client_config(),
        server: args.server,
        history_url: args.history,
        token: args.token,
    };
    log::debug!("App started");
    yew::Renderer::<app::TableApp>::with_root_and_props(root, props).render();
    Ok(())
}
