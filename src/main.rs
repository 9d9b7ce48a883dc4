use std::time::Instant;

use anyhow::Context;
use log::info;

use gan_training::{
    Config,
    checkpoint::FileCheckpointStore,
    data::MnistDataset,
    export::GridExporter,
    summary::{SUMMARY_FILE, SummaryWriter},
    training::{ComputeContext, LoopConfig, TrainingLoop},
};
use machine_learning::VanillaGan;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();

    let config = Config::load().context("failed to load the configuration")?;

    let dataset = MnistDataset::open(&config.dataset.path, config.dataset.seed)
        .with_context(|| format!("failed to open MNIST at {}", config.dataset.path.display()))?;

    let ctx = ComputeContext::new(config.runtime.threads, config.runtime.seed)?;

    let model = VanillaGan::new(config.model.gan_config(), config.runtime.seed)
        .context("invalid model configuration")?;

    let store = FileCheckpointStore::new(&config.results.model, config.runtime.max_to_keep)?;
    let summary_path = store.dir().join(SUMMARY_FILE);
    let summary = SummaryWriter::create(&summary_path)
        .with_context(|| format!("failed to open {}", summary_path.display()))?;

    let loop_cfg = LoopConfig::new(
        config.train_step.global_step,
        config.train_step.logging_interval,
        config.results.output.clone(),
    );

    let exporter = GridExporter::new();
    let mut training = TrainingLoop::new(loop_cfg, model, dataset, store, exporter, summary)?;
    let metrics = training.run(&ctx)?;
    ctx.close();

    info!(
        d_updates = metrics.d_updates,
        d_skips = metrics.d_skips,
        evaluations = metrics.evaluations;
        "wrapping up after {:.2}s of training",
        metrics.elapsed.as_secs_f64()
    );
    println!("[+] Elapsed time {:.8}s", start.elapsed().as_secs_f64());

    Ok(())
}
