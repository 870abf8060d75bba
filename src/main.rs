use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use clap::Parser;
use ember::middleware::TracingMiddleware;
use ember::telemetry::{init_logging, LogConfig};
use ember::{option, Context, HttpError, InTransform, OpenApiConfig, Registrar, ServerBuilder, ToSchema};
use http::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ember", version, about = "Ingredient API demo for ember")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "EMBER_ADDR", default_value = "localhost:9999")]
    addr: String,
    /// Pretty-print the exported document
    #[arg(long)]
    pretty: bool,
    /// Do not write the document to disk
    #[arg(long)]
    no_local_save: bool,
    /// json or pretty
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(description = "A stored ingredient")]
struct Ingredient {
    id: u64,
    name: String,
    description: String,
    #[schema(minimum = 0)]
    calories: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[schema(transform)]
struct CreateIngredient {
    #[schema(required, min_length = 2, max_length = 64, example = "Basil")]
    name: String,
    description: Option<String>,
    #[schema(minimum = 0, maximum = 10000)]
    calories: Option<u32>,
}

impl InTransform for CreateIngredient {
    fn in_transform(&mut self) -> anyhow::Result<()> {
        self.name = self.name.trim().to_string();
        if self.description.as_deref().map_or(true, str::is_empty) {
            self.description = Some("No description".to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
struct Store {
    next_id: u64,
    items: BTreeMap<u64, Ingredient>,
}

type Shared = Arc<Mutex<Store>>;

fn lock(store: &Shared) -> std::sync::MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut log_config = LogConfig::from_env();
    log_config.format = args.log_format.parse().map_err(anyhow::Error::msg)?;
    let _log_guard = init_logging(&log_config)?;

    let mut server = ServerBuilder::new()
        .addr(args.addr.as_str())
        .info("Ingredients", "0.1.0")
        .description("Demo service for ember")
        .openapi_config(OpenApiConfig {
            pretty_json: args.pretty,
            disable_local_save: args.no_local_save,
            ..OpenApiConfig::default()
        })
        .build();
    server.use_middleware(TracingMiddleware);

    let store: Shared = Arc::new(Mutex::new(Store::default()));
    let api = server.group("/ingredients");

    let s = Arc::clone(&store);
    api.get("/", move |ctx: &mut Context<'_, ()>| {
        let limit = ctx.query_param_int("limit")?.unwrap_or(100).max(0);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(lock(&s).items.values().take(limit).cloned().collect::<Vec<_>>())
    })
    .summary("List ingredients")
    .query_param("limit", "Maximum number of ingredients returned");

    let s = Arc::clone(&store);
    api.register(
        Method::POST,
        "/",
        move |ctx: &mut Context<'_, CreateIngredient>| {
            let body = ctx.take_body();
            let mut store = lock(&s);
            if store.items.values().any(|i| i.name.eq_ignore_ascii_case(&body.name)) {
                return Err(HttpError::conflict(format!("ingredient {} already exists", body.name)).into());
            }
            store.next_id += 1;
            let ingredient = Ingredient {
                id: store.next_id,
                name: body.name,
                description: body.description.unwrap_or_default(),
                calories: body.calories,
            };
            store.items.insert(ingredient.id, ingredient.clone());
            ctx.set_status(201);
            Ok(ingredient)
        },
        vec![
            option::summary("Create an ingredient"),
            option::add_error(409, "Conflict: an ingredient with this name exists"),
        ],
    );

    let s = Arc::clone(&store);
    api.get("/{id}", move |ctx: &mut Context<'_, ()>| {
        let id = ctx.path_param_int("id")?;
        let id = u64::try_from(id).map_err(|_| HttpError::bad_request("id must be positive"))?;
        lock(&s)
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| HttpError::not_found(format!("ingredient {id} not found")).into())
    })
    .summary("Get an ingredient")
    .add_error(404, "Not Found");

    let s = Arc::clone(&store);
    api.delete("/{id}", move |ctx: &mut Context<'_, ()>| {
        let id = ctx.path_param_int("id")?;
        let id = u64::try_from(id).map_err(|_| HttpError::bad_request("id must be positive"))?;
        match lock(&s).items.remove(&id) {
            Some(_) => {
                ctx.set_status(204);
                Ok(())
            }
            None => Err(HttpError::not_found(format!("ingredient {id} not found")).into()),
        }
    })
    .summary("Delete an ingredient")
    .add_error(404, "Not Found");

    info!(addr = %args.addr, "Starting ingredient demo");
    server.run()
}
