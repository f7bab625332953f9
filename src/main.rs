//! ButtonHub firmware entry point.
//!
//! Boot sequence: mount flash, load settings and the command table,
//! bring up the robot RPC client, then run the control loop. The loop
//! polls the fixed GPIO keys, drains the input-event channel, and for
//! each recognized button looks up its binding and dispatches it to
//! the robot.
//!
//! ```text
//! GPIO keys ─┐
//! BLE scan ──┼─▶ EVENT_CHANNEL ─▶ control loop ─▶ CommandTable lookup
//!            │                        │
//!            │                        ├─▶ Dispatcher ─▶ RpcClient ─▶ robot
//!            │                        └─▶ save / prune
//! ```

#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use burster::Limiter;
use log::{info, warn};

use buttonhub::adapters::http::EspHttp;
use buttonhub::adapters::storage::FlashStore;
use buttonhub::adapters::time::MonotonicClock;
use buttonhub::config::{HubConfig, HubSettings};
use buttonhub::dispatch::Dispatcher;
use buttonhub::drivers::gpio_button::GpioButton;
use buttonhub::events::EVENT_CHANNEL;
use buttonhub::robot_info::RobotInfoHolder;
use buttonhub::rpc::RpcClient;
use buttonhub::table::CommandTable;

/// Recency log capacity; the config UI shows at most this many buttons.
const MAX_OBSERVED_BUTTONS: usize = 16;

/// Wall key wired to the boot button.
const WALL_KEY_GPIO_ID: u8 = 1;

/// Token bucket guarding against a stuck or flapping input source:
/// short bursts pass, sustained repeats are dropped.
const DISPATCH_BURST: u64 = 2;
const DISPATCH_PER_SEC: u64 = 1;

fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init().context("logger init")?;

    info!("ButtonHub v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Flash + persisted state ────────────────────────────
    // Storage is load-bearing for everything after this point; an
    // unmountable flash partition warrants a restart so SPIFFS can
    // reformat on the way back up.
    let mut settings_store = match FlashStore::new() {
        Ok(store) => store,
        Err(e) => {
            log::error!("flash mount failed: {e}, restarting");
            unsafe { esp_idf_svc::sys::esp_restart() };
            #[allow(unreachable_code)]
            {
                unreachable!()
            }
        }
    };
    let table_store = FlashStore::new().context("flash store")?;

    let config = HubConfig::default();
    let settings = HubSettings::load(&mut settings_store);
    if settings.robot_host.is_empty() {
        warn!("no robot paired; dispatch disabled until a host is set");
    } else {
        info!("paired robot: {}", settings.robot_host);
    }

    let table = CommandTable::new(table_store, MAX_OBSERVED_BUTTONS);
    table.load();

    // ── 3. Robot link ─────────────────────────────────────────
    let client = RpcClient::with_timeout(
        settings.robot_host.clone(),
        config.robot_port,
        Duration::from_secs(u64::from(config.rpc_timeout_secs)),
    );
    let robot_info = RobotInfoHolder::new();
    let mut http = EspHttp;

    // ── 4. Input hardware ─────────────────────────────────────
    let peripherals =
        esp_idf_svc::hal::peripherals::Peripherals::take().context("peripherals")?;
    let mut key_pin = esp_idf_svc::hal::gpio::PinDriver::input(peripherals.pins.gpio0)
        .context("wall key gpio")?;
    key_pin
        .set_pull(esp_idf_svc::hal::gpio::Pull::Up)
        .context("wall key pull-up")?;
    let mut wall_key = GpioButton::new(key_pin, WALL_KEY_GPIO_ID, config.gpio_debounce_ms);

    let clock = MonotonicClock::new();
    let mut dispatch_limiter = burster::TokenBucket::new_with_time_provider(
        DISPATCH_BURST,
        DISPATCH_PER_SEC,
        platform_now as fn() -> Duration,
    );

    info!("system ready, entering control loop");

    // ── 5. Control loop ───────────────────────────────────────
    let tick = Duration::from_millis(u64::from(config.control_loop_interval_ms));
    let refresh_every = u64::from(config.robot_info_interval_secs) * 1000;
    // Back-dated so the first fetch happens on the first tick.
    let mut last_refresh_ms: u64 = 0u64.wrapping_sub(refresh_every);

    loop {
        std::thread::sleep(tick);
        let now_ms = clock.uptime_ms();

        wall_key.poll(now_ms as u32);

        // Keep the robot metadata cache warm; pieces that fail are
        // retried on the next round.
        if !settings.robot_host.is_empty()
            && !robot_info.snapshot().is_complete()
            && now_ms.wrapping_sub(last_refresh_ms) >= refresh_every
        {
            last_refresh_ms = now_ms;
            robot_info.refresh(&client);
        }

        while let Ok(event) = EVENT_CHANNEL.try_receive() {
            table.notify_observed_button(event.button, event.estimated_distance);
            table.save();

            let Some(mut command) = table.command_for(&event.button) else {
                info!("unbound button: {}", event.button);
                continue;
            };
            if settings.robot_host.is_empty() {
                warn!("press ignored, no robot paired");
                continue;
            }
            if dispatch_limiter.try_consume(1).is_err() {
                warn!("press dropped, input source flooding");
                continue;
            }
            if settings.beep_on_press && command.tts_on_success.is_empty() {
                command.tts_on_success = "OK".into();
            }

            let mut dispatcher = Dispatcher::new(&client, &mut http, &robot_info)
                .with_shim_delay(Duration::from_millis(u64::from(
                    config.lock_shim_delay_ms,
                )));
            let accepted = dispatcher.dispatch(&command);
            info!(
                "{} -> {}",
                event.button,
                if accepted { "accepted" } else { "rejected" }
            );
        }

        table.prune_observed(u64::from(config.observation_ttl_secs));
    }
}
