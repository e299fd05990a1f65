use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use visearch::image::io::load_gray_image;
use visearch::{
    build_object_responses, build_patch_prototypes, build_vector_prototypes, Config, FilterBank,
    FloatMode, GrayImage, ImageView, Model,
};

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Visearch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for progress and numeric diagnostics.
    #[arg(long)]
    trace: bool,
    /// Fail on numeric violations instead of clamping them.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FloatModeConfig {
    Trap,
    Clamp,
}

impl From<FloatModeConfig> for FloatMode {
    fn from(value: FloatModeConfig) -> Self {
        match value {
            FloatModeConfig::Trap => FloatMode::Trap,
            FloatModeConfig::Clamp => FloatMode::Clamp,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ModelConfigJson {
    scale_sizes: Vec<usize>,
    pool_size: usize,
    prototype_size: usize,
    num_kept_weights: usize,
    num_patch_prototypes: usize,
    num_vector_prototypes_per_object: usize,
    sigma_s1: f64,
    sigma_s2b: f64,
    lip_norm: f64,
    inhibition_gain: f64,
    inhibition_sigma: f64,
    max_sampling_retries: usize,
    float_mode: FloatModeConfig,
    parallel: bool,
}

impl Default for ModelConfigJson {
    fn default() -> Self {
        let cfg = Config::production();
        Self {
            scale_sizes: cfg.scale_sizes,
            pool_size: cfg.pool_size,
            prototype_size: cfg.prototype_size,
            num_kept_weights: cfg.num_kept_weights,
            num_patch_prototypes: cfg.num_patch_prototypes,
            num_vector_prototypes_per_object: cfg.num_vector_prototypes_per_object,
            sigma_s1: cfg.sigma_s1,
            sigma_s2b: cfg.sigma_s2b,
            lip_norm: cfg.lip_norm,
            inhibition_gain: cfg.inhibition_gain,
            inhibition_sigma: cfg.inhibition_sigma,
            max_sampling_retries: cfg.max_sampling_retries,
            float_mode: FloatModeConfig::Clamp,
            parallel: cfg.parallel,
        }
    }
}

impl ModelConfigJson {
    fn into_config(self, strict: bool) -> Config {
        Config {
            scale_sizes: self.scale_sizes,
            pool_size: self.pool_size,
            prototype_size: self.prototype_size,
            num_kept_weights: self.num_kept_weights,
            num_patch_prototypes: self.num_patch_prototypes,
            num_vector_prototypes_per_object: self.num_vector_prototypes_per_object,
            sigma_s1: self.sigma_s1,
            sigma_s2b: self.sigma_s2b,
            lip_norm: self.lip_norm,
            inhibition_gain: self.inhibition_gain,
            inhibition_sigma: self.inhibition_sigma,
            max_sampling_retries: self.max_sampling_retries,
            float_mode: if strict {
                FloatMode::Trap
            } else {
                self.float_mode.into()
            },
            parallel: self.parallel,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RunConfig {
    prototype_images: Vec<String>,
    object_images: Vec<String>,
    search_image: String,
    target: usize,
    fixations: usize,
    seed: u64,
    output_path: Option<String>,
    model: ModelConfigJson,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            prototype_images: Vec::new(),
            object_images: Vec::new(),
            search_image: String::new(),
            target: 0,
            fixations: 1,
            seed: 0,
            output_path: None,
            model: ModelConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DecisionRecord {
    object_id: usize,
    scores: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct FixationRecord {
    x: usize,
    y: usize,
    priority: f64,
}

#[derive(Debug, Serialize)]
struct Output {
    decision: DecisionRecord,
    target: usize,
    fixations: Vec<FixationRecord>,
}

fn load_all(paths: &[String]) -> Result<Vec<GrayImage>, Box<dyn std::error::Error>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        images.push(load_gray_image(path)?);
    }
    Ok(images)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("visearch=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let run: RunConfig = serde_json::from_str(&config_text)?;
    if run.prototype_images.is_empty() || run.object_images.is_empty() || run.search_image.is_empty() {
        return Err("prototype_images, object_images and search_image must be set in the config".into());
    }
    if run.target >= run.object_images.len() {
        return Err("target must index into object_images".into());
    }
    if run.fixations == 0 {
        return Err("fixations must be at least 1".into());
    }

    let cfg = run.model.into_config(cli.strict);
    cfg.validate()?;
    let mut rng = StdRng::seed_from_u64(run.seed);

    let prototype_images = load_all(&run.prototype_images)?;
    let prototype_views: Vec<ImageView<'_, f64>> = prototype_images.iter().map(GrayImage::view).collect();
    let bank = FilterBank::build(&cfg.scale_sizes)?;
    let patches = build_patch_prototypes(&prototype_views, &bank, &cfg, &mut rng)?;
    let model = Model::with_bank(cfg, bank, patches)?;

    let object_images = load_all(&run.object_images)?;
    let object_views: Vec<ImageView<'_, f64>> = object_images.iter().map(GrayImage::view).collect();
    let responses = build_object_responses(&model, &object_views)?;
    let objects = build_vector_prototypes(&model, &object_views, &mut rng)?;

    let search_image = load_gray_image(&run.search_image)?;
    let decision = model.recognize(search_image.view(), &objects)?;
    let mut episode = model.episode(search_image.view(), &responses, run.target)?;

    let mut fixations = Vec::with_capacity(run.fixations);
    for _ in 0..run.fixations {
        let step = episode.step()?;
        let priority = step
            .priority
            .get(step.fixation.x, step.fixation.y)
            .unwrap_or_default();
        fixations.push(FixationRecord {
            x: step.fixation.x,
            y: step.fixation.y,
            priority,
        });
    }

    let output = Output {
        decision: DecisionRecord {
            object_id: decision.object_id,
            scores: decision.scores,
        },
        target: run.target,
        fixations,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match run.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
