use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fft_trigger_logger::{
    args::{convert_filter, Args, Command, MonitorArgs, RecordArgs, SimArgs},
    capture::{SampleClock, Scaling},
    controller::TriggerController,
    monitoring::TracingObserver,
    record::record,
    shutdown::Shutdown,
    sim::{SimAdc, SimTrigger},
    sink::CsvSink,
};
use tracing::info;

fn sim_adc(sim: &SimArgs, vref: f64, max_code: u16) -> SimAdc {
    sim.tones
        .iter()
        .fold(SimAdc::new(vref, max_code), |adc, &tone| {
            adc.with_tone(tone, sim.sim_amplitude)
        })
        .with_noise(sim.sim_noise)
}

fn monitor(args: MonitorArgs, sim: &SimArgs, shutdown: Shutdown) -> anyhow::Result<()> {
    // Reject bad input before touching any hardware
    let config = args.config()?;
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    info!(
        targets = ?config.targets.iter().collect::<Vec<_>>(),
        tolerance = config.targets.tolerance(),
        threshold = config.targets.threshold(),
        "Target frequencies set"
    );

    let adc = sim_adc(sim, args.vref, args.max_code);
    let trigger = SimTrigger::periodic(
        Duration::from_secs_f64(sim.sim_low),
        Duration::from_secs_f64(sim.sim_high),
    );
    let sink = CsvSink::new(&args.output_dir, &args.prefix);
    let controller = TriggerController::new(adc, trigger, sink, config, shutdown)
        .with_observer(Box::new(TracingObserver));
    controller.run()?;
    Ok(())
}

fn record_once(args: RecordArgs, sim: &SimArgs, shutdown: Shutdown) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let mut adc = sim_adc(sim, args.vref, args.max_code);
    let clock = SampleClock::new(args.channel, Scaling::new(args.vref, args.max_code));
    let mut observer = TracingObserver;
    let rec = record(
        &mut adc,
        &clock,
        args.rate,
        args.duration,
        &args.output_dir,
        Some(&mut observer),
    )?;
    // A capture is one indivisible unit, the interrupt only lands after it
    if shutdown.is_triggered() {
        info!("Interrupted, capture was still saved");
    }
    if let Some(peak) = rec.peak {
        info!(
            freq = peak.freq,
            amplitude = peak.amplitude,
            "Strongest component"
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    let shutdown = Shutdown::new();
    shutdown
        .install_ctrlc()
        .context("installing interrupt handler")?;

    match args.command {
        Command::Monitor(monitor_args) => monitor(monitor_args, &args.sim, shutdown),
        Command::Record(record_args) => record_once(record_args, &args.sim, shutdown),
    }
}
