use anyhow::{Context, Result};
use crates::reseller::roamify_client::DEFAULT_ROAMIFY_API_URL;

use super::{
    config_model::{
        BackendServer, Cors, Database, DotEnvyConfig, Orders, Roamify, Stripe, Supabase,
    },
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let supabase = Supabase {
        jwt_secret: get_jwt_secret()?,
    };

    let roamify = Roamify {
        api_url: std::env::var("ROAMIFY_API_URL")
            .unwrap_or_else(|_| DEFAULT_ROAMIFY_API_URL.to_string()),
        api_key: std::env::var("ROAMIFY_API_KEY").expect("ROAMIFY_API_KEY is invalid"),
        max_retries: std::env::var("ROAMIFY_MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .context("ROAMIFY_MAX_RETRIES is invalid")?,
        retry_delay_ms: std::env::var("ROAMIFY_RETRY_DELAY_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .context("ROAMIFY_RETRY_DELAY_MS is invalid")?,
    };

    let stripe = Stripe {
        secret_key: std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
            .expect("STRIPE_WEBHOOK_SECRET is invalid"),
    };

    let orders = Orders {
        default_currency: std::env::var("DEFAULT_CURRENCY")
            .unwrap_or_else(|_| "eur".to_string())
            .to_lowercase(),
        esim_provider_host: std::env::var("ESIM_PROVIDER_HOST")
            .unwrap_or_else(|_| "esimfly.al".to_string()),
        rate_limit_max: std::env::var("ORDER_RATE_LIMIT_MAX")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("ORDER_RATE_LIMIT_MAX is invalid")?,
        rate_limit_window_secs: std::env::var("ORDER_RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .context("ORDER_RATE_LIMIT_WINDOW_SECS is invalid")?,
    };

    let cors = Cors {
        allowed_origins: parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
        ),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        roamify,
        stripe,
        orders,
        cors,
        stage: get_stage(),
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_jwt_secret() -> Result<String> {
    dotenvy::dotenv().ok();

    std::env::var("SUPABASE_JWT_SECRET").context("SUPABASE_JWT_SECRET is invalid")
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
