//! rpcwire conformance client entry point.
//!
//! Connects to a peer serving the conformance service and runs every method
//! once, checking that each value comes back intact.
//!
//! # What happens at startup
//!
//! 1. CLI arguments are parsed with `clap` into a [`Cli`] struct.
//! 2. The TOML config is loaded (or defaults are used) and CLI flags are
//!    applied on top of it.
//! 3. `tracing_subscriber` is initialised.  `RUST_LOG` wins; otherwise the
//!    configured `[logging] level` is used.
//! 4. The transport stack is connected and wrapped in a [`ClientBase`].
//! 5. The conformance calls run in order; the first mismatch aborts the run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, ensure, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rpcwire_client::conformance::calls::TestMultiCall;
use rpcwire_client::conformance::{ConformanceClient, Insanity, Xception, Xtruct, Xtruct2};
use rpcwire_client::infrastructure::{ClientConfig, LoggingListener};
use rpcwire_client::{ClientBase, ClientError};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Binary RPC conformance client.
///
/// Flags override the values from `--config`.
#[derive(Debug, Parser)]
#[command(
    name = "rpcwire-client",
    about = "Runs the conformance service calls against a live peer",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "RPCWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Hostname or IP address of the peer.
    #[arg(long, env = "RPCWIRE_HOST")]
    host: Option<String>,

    /// TCP port of the peer.
    #[arg(long, env = "RPCWIRE_PORT")]
    port: Option<u16>,

    /// How long a call waits for its reply, in milliseconds.
    #[arg(long, env = "RPCWIRE_READ_TIMEOUT_MS")]
    read_timeout_ms: Option<u64>,

    /// Use 4-byte length-prefixed frames.
    #[arg(long, env = "RPCWIRE_FRAMED")]
    framed: bool,
}

impl Cli {
    /// Loads the configuration file (if any) and applies the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged values are invalid.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(host) = self.host {
            config.connection.host = host;
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        if let Some(read_timeout_ms) = self.read_timeout_ms {
            config.connection.read_timeout_ms = read_timeout_ms;
        }
        if self.framed {
            config.connection.framed = true;
        }

        config.validate().context("invalid command-line overrides")?;
        Ok(config)
    }
}

// ── Conformance run ───────────────────────────────────────────────────────────

fn sample_xtruct() -> Xtruct {
    Xtruct {
        string_thing: Some("foo".into()),
        byte_thing: Some(1),
        i32_thing: Some(2),
        i64_thing: Some(3),
    }
}

/// Runs every conformance call once.
async fn run_conformance(client: &ConformanceClient) -> anyhow::Result<()> {
    client.test_void().await.context("testVoid")?;
    info!("testVoid ok");

    let echoed = client.test_string("Test").await.context("testString")?;
    ensure!(echoed == "Test", "testString returned {echoed:?}");

    ensure!(client.test_bool(true).await.context("testBool")?, "testBool returned false");
    ensure!(client.test_byte(1).await.context("testByte")? == 1, "testByte mismatch");
    ensure!(client.test_i32(-1).await.context("testI32")? == -1, "testI32 mismatch");
    ensure!(
        client.test_i64(-34_359_738_368).await.context("testI64")? == -34_359_738_368,
        "testI64 mismatch"
    );
    let double = client.test_double(-5.2098523).await.context("testDouble")?;
    ensure!((double - -5.2098523).abs() < f64::EPSILON, "testDouble returned {double}");
    info!("scalar echoes ok");

    let xtruct = sample_xtruct();
    let echoed = client.test_struct(xtruct.clone()).await.context("testStruct")?;
    ensure!(echoed == xtruct, "testStruct returned {echoed:?}");

    let nest = Xtruct2 {
        byte_thing: Some(4),
        struct_thing: Some(xtruct.clone()),
        i32_thing: Some(5),
    };
    let echoed = client.test_nest(nest.clone()).await.context("testNest")?;
    ensure!(echoed == nest, "testNest returned {echoed:?}");
    info!("struct echoes ok");

    let map: BTreeMap<i32, i32> = (0..5).map(|i| (i, i - 10)).collect();
    let echoed = client.test_map(map.clone()).await.context("testMap")?;
    ensure!(echoed == map, "testMap returned {echoed:?}");

    let string_map: BTreeMap<String, String> = [("a", "2"), ("b", "blah")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let echoed = client
        .test_string_map(string_map.clone())
        .await
        .context("testStringMap")?;
    ensure!(echoed == string_map, "testStringMap returned {echoed:?}");

    let set: BTreeSet<i32> = (-2..3).collect();
    let echoed = client.test_set(set.clone()).await.context("testSet")?;
    ensure!(echoed == set, "testSet returned {echoed:?}");

    let list: Vec<i32> = (-2..3).collect();
    let echoed = client.test_list(list.clone()).await.context("testList")?;
    ensure!(echoed == list, "testList returned {echoed:?}");
    info!("container echoes ok");

    ensure!(client.test_enum(2).await.context("testEnum")? == 2, "testEnum mismatch");
    ensure!(
        client.test_typedef(309_858_235_082_523).await.context("testTypedef")?
            == 309_858_235_082_523,
        "testTypedef mismatch"
    );

    let insanity = Insanity {
        user_map: Some([(5, 5000), (8, 8000)].into_iter().collect()),
        xtructs: Some(vec![xtruct.clone()]),
    };
    let crazy = client.test_insanity(insanity).await.context("testInsanity")?;
    ensure!(!crazy.is_empty(), "testInsanity returned an empty map");

    let multi = client
        .test_multi(TestMultiCall {
            arg0: 9,
            arg1: 10,
            arg2: 11,
            ..Default::default()
        })
        .await
        .context("testMulti")?;
    ensure!(multi.byte_thing == Some(9), "testMulti returned {multi:?}");
    info!("multi-argument calls ok");

    match client.test_exception("Xception").await {
        Err(err) if err.service_exception::<Xception>().is_some() => {}
        other => bail!("testException(\"Xception\") returned {other:?}"),
    }
    match client.test_exception("TException").await {
        Err(ClientError::Application(_)) => {}
        other => bail!("testException(\"TException\") returned {other:?}"),
    }
    client
        .test_exception("success")
        .await
        .context("testException(\"success\")")?;
    let ok = client
        .test_multi_exception("Normal", "ok")
        .await
        .context("testMultiException")?;
    ensure!(ok.string_thing.as_deref() == Some("ok"), "testMultiException returned {ok:?}");
    info!("exceptions ok");

    client.test_oneway(1).await.context("testOneway")?;
    // The connection must still serve two-way calls after a oneway.
    client.test_void().await.context("testVoid after testOneway")?;
    info!("oneway ok");

    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_client_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let peer = format!("{}:{}", config.connection.host, config.connection.port);
    info!("rpcwire conformance client starting, peer={peer}");

    let protocol = config
        .connect()
        .await
        .with_context(|| format!("connecting to {peer}"))?;

    let base = ClientBase::from_boxed(protocol, Arc::new(LoggingListener::new(peer)));
    let client = ConformanceClient::new(base);

    let outcome = run_conformance(&client).await;
    client.close();
    outcome?;

    info!("all conformance calls passed");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
