// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! OKVS benchmark CLI
//!
//! Encodes random keys, decodes them all back in parallel and reports timings.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use num_bigint::RandBigInt;
use okvs::{BatchDecoder, Encoder, Gf2, Okvs, OkvsConfig, Params, Placement, PrimeField, Ring};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RingKind {
    /// 32-bit words over GF(2)
    Gf2,
    /// 128-bit words over GF(2)
    Gf2Wide,
    /// Random prime field
    Field,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Encode random key-value pairs into an OKVS and decode them back.")]
struct Args {
    /// Number of key-value pairs
    #[arg(long, default_value_t = 1 << 16)]
    n: usize,

    /// Table slack, M = ceil(n * (1 + epsilon))
    #[arg(long, default_value_t = 0.03)]
    epsilon: f64,

    /// Band width in bits
    #[arg(long, default_value_t = 256)]
    w: usize,

    /// Ring the table is defined over
    #[arg(long, value_enum, default_value_t = RingKind::Gf2)]
    ring: RingKind,

    /// Bit length of the random prime for `--ring field`
    #[arg(long, default_value_t = 64)]
    q_bits: u64,

    /// Round start positions down to byte boundaries
    #[arg(long, default_value_t = false)]
    byte_aligned: bool,

    /// Worker threads, overrides the configuration
    #[arg(long)]
    threads: Option<usize>,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the encoded table here and read it back
    #[arg(long)]
    output: Option<PathBuf>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Debug-level logging
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer())
        .init();

    let mut config = OkvsConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    let params = Params::with_slack(args.n, args.w, args.epsilon)?;
    let placement = if args.byte_aligned {
        Placement::ByteAligned
    } else {
        Placement::Uniform
    };
    let mut rng = match args.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };

    info!(
        n = params.n,
        m = params.m,
        w = params.w,
        threads = config.threads,
        ring = ?args.ring,
        "Starting OKVS run"
    );

    match args.ring {
        RingKind::Gf2 => {
            let pairs = random_pairs(params.n, &mut rng, |rng| rng.gen::<u32>());
            exercise(Gf2::new(), params, placement, &config, &pairs, args.output, &mut rng)
        }
        RingKind::Gf2Wide => {
            let ring = Gf2::<u128>::default();
            let pairs = random_pairs(params.n, &mut rng, |rng| rng.gen::<u128>());
            exercise(ring, params, placement, &config, &pairs, args.output, &mut rng)
        }
        RingKind::Field => {
            let field = PrimeField::random(args.q_bits, &mut rng)?;
            info!(q = %field.modulus(), "Drew prime modulus");
            let q = field.modulus().clone();
            let pairs = random_pairs(params.n, &mut rng, |rng| rng.gen_biguint_below(&q));
            exercise(field, params, placement, &config, &pairs, args.output, &mut rng)
        }
    }
}

fn random_pairs<V>(
    n: usize,
    rng: &mut ChaCha20Rng,
    mut value: impl FnMut(&mut ChaCha20Rng) -> V,
) -> Vec<([u8; 8], V)> {
    (0..n)
        .map(|_| {
            let key: [u8; 8] = rng.gen();
            (key, value(rng))
        })
        .collect()
}

fn exercise<R: Ring>(
    ring: R,
    params: Params,
    placement: Placement,
    config: &OkvsConfig,
    pairs: &[([u8; 8], R::Value)],
    output: Option<PathBuf>,
    rng: &mut ChaCha20Rng,
) -> Result<()> {
    let encoder = Encoder::new(params, ring.clone(), config)?;
    let decoder = BatchDecoder::with_scheduler(encoder.scheduler().clone(), config.decode_block);

    let started = Instant::now();
    let okvs = encoder.encode_with_retry(pairs, placement, rng)?;
    let encode_time = started.elapsed();

    let keys: Vec<[u8; 8]> = pairs.iter().map(|(key, _)| *key).collect();
    let started = Instant::now();
    let decoded = decoder.decode(&okvs, &keys);
    let decode_time = started.elapsed();

    decoder.verify(&okvs, pairs)?;
    println!(
        "encoding n = {}, m = {}, w = {}: {:?}",
        params.n, params.m, params.w, encode_time
    );
    println!("decoding {} keys: {:?}", decoded.len(), decode_time);
    println!("✓ every key decodes to its value");

    if let Some(path) = output {
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        okvs.write_to(&mut writer)?;
        writer.flush()?;

        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let restored = Okvs::read_from(&mut BufReader::new(file), ring, *okvs.keying())?;
        decoder.verify(&restored, pairs)?;
        println!("✓ table written to {} and read back", path.display());
    }

    Ok(())
}
