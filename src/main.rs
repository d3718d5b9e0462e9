use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;

use dts::ShapeBuilder;
use dts::codec::{read_shape_file, write_dsq};
use dts::settings::{Settings, StripAlgorithm};
use dts::summary::ShapeSummary;

const USAGE: &str = "usage: dtstool <command> [args]

commands:
  info <shape.dts>
  dump <shape.dts> [out.json]
  strip <in.dts> <out.dts> [--cache N] [--algorithm cache|greedy] [--mesh N]
  sort <in.dts> <out.dts> [--depth N] [--big-faces N] [--mesh N]
  rewrite <in.dts> <out.dts>
  export-dsq <shape.dts> <sequence> <out.dsq>
  settings [show|save]";

/// `--name value` pairs after the positional arguments.
struct Flags<'a>(&'a [String]);

impl Flags<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .position(|a| a == name)
            .and_then(|i| self.0.get(i + 1))
            .map(String::as_str)
    }

    fn number<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("{name} expects a number, got '{v}'")),
            None => Ok(None),
        }
    }
}

fn positional<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(a) if !a.starts_with("--") => Ok(a),
        _ => bail!("missing {what}\n\n{USAGE}"),
    }
}

fn load(path: &str, settings: &Settings) -> Result<ShapeBuilder> {
    let shape = read_shape_file(path).with_context(|| format!("Failed to load shape '{path}'"))?;
    info!("loaded {path}: {} meshes", shape.meshes.len());
    Ok(ShapeBuilder::from_shape(shape, settings.clone()))
}

fn save(builder: &ShapeBuilder, path: &str) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create '{path}'"))?;
    let mut w = BufWriter::new(file);
    let header = builder
        .serialize(&mut w)
        .with_context(|| format!("Failed to write shape '{path}'"))?;
    w.flush()?;
    info!("wrote {path}: {} bytes of buffers", header.total_size * 4);
    Ok(())
}

fn info(path: &str, settings: &Settings) -> Result<()> {
    let builder = load(path, settings)?;
    println!("{path}");
    print!("{}", ShapeSummary(builder.shape()));
    Ok(())
}

fn dump(path: &str, out: Option<&str>, settings: &Settings) -> Result<()> {
    let builder = load(path, settings)?;
    let json = serde_json::to_string_pretty(builder.shape())?;
    match out {
        Some(out) => std::fs::write(out, json).with_context(|| format!("Failed to write '{out}'"))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn strip(input: &str, output: &str, flags: &Flags, mut settings: Settings) -> Result<()> {
    if let Some(cache) = flags.number("--cache")? {
        settings.strip.cache_size = cache;
    }
    if let Some(name) = flags.get("--algorithm") {
        settings.strip.algorithm = StripAlgorithm::from_name(name)
            .with_context(|| format!("unknown strip algorithm '{name}'"))?;
    }
    let mut builder = load(input, &settings)?;
    match flags.number::<usize>("--mesh")? {
        Some(mesh) => builder.stripify(mesh, settings.strip.cache_size)?,
        None => builder.stripify_all(),
    }
    builder.finalize()?;
    save(&builder, output)
}

fn sort(input: &str, output: &str, flags: &Flags, mut settings: Settings) -> Result<()> {
    if let Some(depth) = flags.number("--depth")? {
        settings.sort.max_depth = depth;
    }
    if let Some(big) = flags.number("--big-faces")? {
        settings.sort.num_big_faces = big;
    }
    let mut builder = load(input, &settings)?;
    match flags.number::<usize>("--mesh")? {
        Some(mesh) => builder.sort(mesh, settings.sort.max_depth, settings.sort.num_big_faces)?,
        None => {
            let sorted = builder.sort_translucent()?;
            println!("sorted {sorted} meshes");
        }
    }
    builder.finalize()?;
    save(&builder, output)
}

fn export_dsq(input: &str, sequence: &str, output: &str, settings: &Settings) -> Result<()> {
    let builder = load(input, settings)?;
    let shape = builder.shape();
    let index = shape
        .find_sequence(sequence)
        .with_context(|| format!("no sequence named '{sequence}' in '{input}'"))?;
    let file = File::create(output).with_context(|| format!("Failed to create '{output}'"))?;
    let mut w = BufWriter::new(file);
    write_dsq(&mut w, shape, index)?;
    w.flush()?;
    Ok(())
}

fn settings_command(action: Option<&str>, settings: &Settings) -> Result<()> {
    match action.unwrap_or("show") {
        "show" => println!("{}", serde_json::to_string_pretty(settings)?),
        "save" => {
            settings.save().context("Failed to save settings")?;
            println!("settings saved");
        }
        other => bail!("unknown settings action '{other}'"),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };
    let flags = Flags(&args);
    let settings = Settings::load();

    match command.as_str() {
        "info" => info(positional(&args, 1, "shape path")?, &settings),
        "dump" => dump(
            positional(&args, 1, "shape path")?,
            args.get(2).map(String::as_str),
            &settings,
        ),
        "strip" => strip(
            positional(&args, 1, "input path")?,
            positional(&args, 2, "output path")?,
            &flags,
            settings,
        ),
        "sort" => sort(
            positional(&args, 1, "input path")?,
            positional(&args, 2, "output path")?,
            &flags,
            settings,
        ),
        "rewrite" => {
            let input = positional(&args, 1, "input path")?;
            let output = positional(&args, 2, "output path")?;
            let builder = load(input, &settings)?;
            save(&builder, output)
        }
        "export-dsq" => export_dsq(
            positional(&args, 1, "shape path")?,
            positional(&args, 2, "sequence name")?,
            positional(&args, 3, "output path")?,
            &settings,
        ),
        "settings" => settings_command(args.get(1).map(String::as_str), &settings),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => {
            if Path::new(other).exists() {
                // A bare path behaves like `info`
                return info(other, &settings);
            }
            bail!("unknown command '{other}'\n\n{USAGE}")
        }
    }
}
