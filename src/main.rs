// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: AGPL-3.0-only

use std::fs::{read_to_string, write, File};
use std::io::{self, BufRead, BufReader};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use gatehouse_server::url::Url;
use gatehouse_server::{destroy, App, TlsConfig};

use anyhow::{bail, Context as _};
use async_std::net::TcpListener;
use clap::{Parser, Subcommand};
use confargs::{prefix_char_filter, Toml};
use futures::StreamExt;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Authenticated GraphQL gateway in front of a single-table Todo store.
///
/// Any command-line options listed here may be specified by one or
/// more configuration files, which can be used by passing the
/// name of the file on the command-line with the syntax `@config.toml`.
/// The configuration file must contain valid TOML table mapping argument
/// names to their values.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to.
    #[arg(long, default_value_t = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080))]
    addr: SocketAddr,

    /// Public URL of the service. Defaults to one derived from `--addr`.
    #[arg(long)]
    url: Option<Url>,

    /// Path to the record store. Records are kept in memory if unset.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Path to a GraphQL schema to serve instead of the default one.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Path to PEM-encoded server certificate.
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// Path to PEM-encoded server certificate key.
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// Region the identity pool is provisioned in.
    #[arg(long, default_value = "local")]
    region: String,

    /// Secret to sign bearer tokens with. Provisioned if unset.
    #[arg(long)]
    token_secret: Option<String>,

    /// File to write the deployment outputs to.
    #[arg(long)]
    outputs: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Irrecoverably remove the records and deployment kept in `--store`.
    Destroy,
}

fn open_buffered(p: impl AsRef<Path>) -> io::Result<impl BufRead> {
    File::open(p).map(BufReader::new)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[async_std::main]
async fn main() -> anyhow::Result<()> {
    let Args {
        addr,
        url,
        store,
        schema,
        cert,
        key,
        region,
        token_secret,
        outputs,
        log_json,
        command,
    } = confargs::args::<Toml>(prefix_char_filter::<'@'>)
        .context("Failed to parse config")
        .map(Args::parse_from)?;

    init_tracing(log_json);

    if let Some(Command::Destroy) = command {
        let Some(store) = store else {
            bail!("`--store` is required to destroy a deployment");
        };
        return destroy(&store)
            .await
            .with_context(|| format!("Failed to destroy store at `{}`", store.display()));
    }

    let url = match url {
        Some(url) => url,
        None => {
            let scheme = if cert.is_some() { "https" } else { "http" };
            format!("{scheme}://{addr}/")
                .parse()
                .context("Failed to derive service URL")?
        }
    };

    let mut builder = App::builder(url).region(region);
    if let Some(store) = store {
        builder = builder.store(store);
    }
    if let Some(schema) = schema {
        let sdl = read_to_string(&schema)
            .with_context(|| format!("Failed to read schema at `{}`", schema.display()))?;
        builder = builder.schema(sdl);
    }
    if let (Some(cert), Some(key)) = (cert, key) {
        let cert = open_buffered(cert).context("Failed to open server certificate file")?;
        let key = open_buffered(key).context("Failed to open server key file")?;
        let tls = TlsConfig::read(cert, key).context("Failed to construct server TLS config")?;
        builder = builder.tls(tls);
    }
    if let Some(secret) = token_secret {
        builder = builder.token_secret(secret);
    }
    let app = builder.build().await.context("Failed to build app")?;

    let json = serde_json::to_string_pretty(app.outputs()).context("Failed to encode outputs")?;
    println!("{json}");
    if let Some(path) = outputs {
        write(&path, &json)
            .with_context(|| format!("Failed to write outputs to `{}`", path.display()))?;
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(target: "main", "listening on {addr}");
    listener
        .incoming()
        .for_each_concurrent(None, |stream| async {
            if let Err(e) = async {
                let stream = stream.context("failed to initialize connection")?;
                debug!(
                    target: "main",
                    "received TCP connection from {}",
                    stream
                        .peer_addr()
                        .map(|peer| peer.to_string())
                        .unwrap_or_else(|_| "unknown address".into())
                );
                app.handle(stream).await
            }
            .await
            {
                error!(target: "main", "failed to handle request: {e:#}");
            }
        })
        .await;
    Ok(())
}
