// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate image;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use env_logger::Env;
use failure::Error;
use image::pnm::PNMEncoder;
use image::pnm::{PNMSubtype, SampleEncoding};
use image::ColorType;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use flame::{run_for, Genome, Histogram};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const SUPERSAMPLE: &str = "supersample";
const THREADS: &str = "threads";
const SECONDS: &str = "seconds";
const MIN_TRANSFORMS: &str = "min-transforms";
const MAX_TRANSFORMS: &str = "max-transforms";
const SEED: &str = "seed";
const GAMMA: &str = "gamma";
const LINEAR: &str = "linear";
const FINAL: &str = "final";
const NO_VARIATIONS: &str = "no-variations";
const GENOME: &str = "genome";
const SAVE_GENOME: &str = "save-genome";
const VERBOSE: &str = "verbose";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("flame")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Fractal flame renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file; .ppm/.pnm are written as binary pixmaps"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("800x600")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(SUPERSAMPLE)
                .long(SUPERSAMPLE)
                .short("S")
                .takes_value(true)
                .default_value("2")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        8,
                        "Could not parse supersample factor",
                        "Supersample factor must be between 1 and 8",
                    )
                })
                .help("Histogram cells per pixel along each axis"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of orbit workers (default: one per CPU)"),
        )
        .arg(
            Arg::with_name(SECONDS)
                .long(SECONDS)
                .short("d")
                .takes_value(true)
                .default_value("5")
                .validator(|s| {
                    validate_range(
                        &s,
                        1u64,
                        3600,
                        "Could not parse run time",
                        "Run time must be between 1 and 3600 seconds",
                    )
                })
                .help("How long to iterate before rendering"),
        )
        .arg(
            Arg::with_name(MIN_TRANSFORMS)
                .long(MIN_TRANSFORMS)
                .takes_value(true)
                .default_value("3")
                .validator(|s| {
                    validate_range(
                        &s,
                        0usize,
                        64,
                        "Could not parse transform count",
                        "Transform count must be at most 64",
                    )
                })
                .help("Fewest affine transforms in a random genome (at least 3)"),
        )
        .arg(
            Arg::with_name(MAX_TRANSFORMS)
                .long(MAX_TRANSFORMS)
                .takes_value(true)
                .default_value("6")
                .validator(|s| {
                    validate_range(
                        &s,
                        0usize,
                        64,
                        "Could not parse transform count",
                        "Transform count must be at most 64",
                    )
                })
                .help("Most affine transforms in a random genome"),
        )
        .arg(
            Arg::with_name(SEED)
                .long(SEED)
                .takes_value(true)
                .validator(|s| match u64::from_str(&s) {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Could not parse seed".to_string()),
                })
                .help("Seed for the genome and the workers"),
        )
        .arg(
            Arg::with_name(GAMMA)
                .long(GAMMA)
                .short("g")
                .takes_value(true)
                .default_value("1.0")
                .validator(|s| {
                    validate_range(
                        &s,
                        0.01f64,
                        100.0,
                        "Could not parse gamma",
                        "Gamma must be between 0.01 and 100",
                    )
                })
                .help("Tone-mapping gamma"),
        )
        .arg(
            Arg::with_name(LINEAR)
                .long(LINEAR)
                .help("Scale brightness linearly with density instead of logarithmically"),
        )
        .arg(
            Arg::with_name(FINAL)
                .long(FINAL)
                .help("Apply the final transforms"),
        )
        .arg(
            Arg::with_name(NO_VARIATIONS)
                .long(NO_VARIATIONS)
                .help("Skip the variations; render the bare IFS"),
        )
        .arg(
            Arg::with_name(GENOME)
                .long(GENOME)
                .takes_value(true)
                .help("Render a genome saved as JSON instead of a random one"),
        )
        .arg(
            Arg::with_name(SAVE_GENOME)
                .long(SAVE_GENOME)
                .takes_value(true)
                .help("Write the genome used to this file as JSON"),
        )
        .arg(
            Arg::with_name(VERBOSE)
                .long(VERBOSE)
                .short("v")
                .help("Log progress"),
        )
        .get_matches()
}

/// Unpacks `0xAARRGGBB` pixels into RGB bytes.
fn to_rgb(pixels: &[u32]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() * 3);
    for p in pixels {
        rgb.push((p >> 16) as u8);
        rgb.push((p >> 8) as u8);
        rgb.push(*p as u8);
    }
    rgb
}

fn write_image(outfile: &str, pixels: &[u8], bounds: (usize, usize)) -> Result<(), std::io::Error> {
    let path = Path::new(outfile);
    match path.extension().and_then(|e| e.to_str()) {
        Some("ppm") | Some("pnm") => {
            let output = File::create(&path)?;
            let mut encoder =
                PNMEncoder::new(output).with_subtype(PNMSubtype::Pixmap(SampleEncoding::Binary));
            encoder.encode(pixels, bounds.0 as u32, bounds.1 as u32, ColorType::RGB(8))
        }
        _ => image::save_buffer(
            &path,
            pixels,
            bounds.0 as u32,
            bounds.1 as u32,
            ColorType::RGB(8),
        ),
    }
}

fn load_genome(path: &str) -> Result<Genome, Error> {
    let genome: Genome = serde_json::from_reader(File::open(path)?)?;
    genome.validate()?;
    Ok(genome)
}

fn value<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.value_of(name).unwrap_or_default()
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let (width, height) = parse_pair::<usize>(value(matches, SIZE), 'x').unwrap_or((800, 600));
    let supersample = usize::from_str(value(matches, SUPERSAMPLE))?;
    let threads = match matches.value_of(THREADS) {
        Some(s) => usize::from_str(s)?,
        None => num_cpus::get(),
    };
    let seconds = u64::from_str(value(matches, SECONDS))?;
    let gamma = f64::from_str(value(matches, GAMMA))?;
    let seed = match matches.value_of(SEED) {
        Some(s) => u64::from_str(s)?,
        None => rand::thread_rng().gen(),
    };

    let mut genome = match matches.value_of(GENOME) {
        Some(path) => load_genome(path)?,
        None => Genome::random(
            usize::from_str(value(matches, MIN_TRANSFORMS))?,
            usize::from_str(value(matches, MAX_TRANSFORMS))?,
            &mut SmallRng::seed_from_u64(seed),
        ),
    };
    if matches.is_present(LINEAR) {
        genome.log_scale = false;
    }
    if matches.is_present(FINAL) {
        genome.final_transform_enabled = true;
    }
    if matches.is_present(NO_VARIATIONS) {
        genome.variation_enabled = false;
    }

    let histogram = Histogram::new(width, height, supersample)?
        .with_camera(genome.camera)?
        .with_gamma(gamma)?;

    info!(
        "rendering {}x{} (supersample {}, gamma {}) on {} threads for {}s, seed {}",
        histogram.width(),
        histogram.height(),
        histogram.supersample(),
        histogram.gamma(),
        threads,
        seconds,
        seed
    );
    let samples = run_for(&genome, &histogram, threads, seed, Duration::from_secs(seconds))?;
    info!("{} samples recorded", samples);

    let pixels = histogram.render(&genome);
    write_image(
        value(matches, OUTPUT),
        &to_rgb(&pixels),
        (histogram.width(), histogram.height()),
    )?;

    if let Some(path) = matches.value_of(SAVE_GENOME) {
        serde_json::to_writer_pretty(File::create(path)?, &genome)?;
    }
    Ok(())
}

fn main() {
    let matches = args();
    let level = if matches.is_present(VERBOSE) { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
