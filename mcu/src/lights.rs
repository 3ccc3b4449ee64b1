use alloc::boxed::Box;
use alloc::{format, vec};

use anyhow::{Result, anyhow};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Instant, Timer};
use esp_hal::gpio::Input;
use esp_hal::i2s::master::DataFormat;
use esp_hal::spi::master::SpiDmaBus;
use esp_hal::time::Rate;
use esp_hal::{Blocking, dma_buffers};

use common::config::{AppConfig, CaptureConfig};
use common::exchange::{FrameExchange, SlotBusy, SpectrumHandoff};
use common::fft::RealFft;
use common::io::{Capture, MonotonicClock, POLL_INTERVAL_US, SampleSource};
use common::pipeline::{DisplayStage, LevelStage, SpectrumStage};
use common::render::{BYTES_PER_PIXEL, RenderTiming};
use common::{BandLevels, FFT_SIZE, NUM_BAND, Spectrum};

use crate::capture::{I2sCapture, I2sPeripherals};
use crate::error_with_location;
use crate::static_buf;
use crate::ws2812::{Ws2812Spi, spi_buffer_len};

pub type LevelExchange = FrameExchange<CriticalSectionRawMutex, BandLevels>;
pub type Handoff = SpectrumHandoff<CriticalSectionRawMutex, &'static mut Spectrum>;

/// How the capture core hands its results to the render core.
pub enum ProducerLink {
    Levels(&'static LevelExchange),
    Spectrum {
        handoff: &'static Handoff,
        buffer: &'static mut Spectrum,
    },
}

/// Peak hold lives on the consumer, so under the drop-frames policy it only
/// tracks the level frames that were not replaced in the slot.
pub enum ConsumerLink {
    Levels(&'static LevelExchange),
    Spectrum(&'static Handoff),
}

/// Capture is polled faster than the exchange; a frame takes ~23 ms.
const CAPTURE_POLL_US: u64 = 5;

/// Frames between two timing reports.
const REPORT_EVERY: u32 = 512;

const I2S_BUFFER_SIZE: usize = 16 * 4 * 1024;
const I2S_POP_SIZE: usize = 4 * 1024;

struct EmbassyClock;

impl MonotonicClock for EmbassyClock {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}

/// Frame rate and worst-case timing, logged every [`REPORT_EVERY`] frames.
struct FrameStats {
    name: &'static str,
    frames: u32,
    window_start: Instant,
    worst: RenderTiming,
}

impl FrameStats {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            frames: 0,
            window_start: Instant::now(),
            worst: RenderTiming::default(),
        }
    }

    fn record(&mut self, timing: Option<RenderTiming>, dropped: Option<u32>) {
        if let Some(timing) = timing {
            if timing.total_us > self.worst.total_us {
                self.worst = timing;
            }
        }
        self.frames += 1;
        if self.frames < REPORT_EVERY {
            return;
        }

        let elapsed_ms = self.window_start.elapsed().as_millis().max(1);
        let fps = self.frames as u64 * 1000 / elapsed_ms;
        match (timing, dropped) {
            (Some(_), _) => log::info!(
                "[{}] {} fps, worst frame: fill {} us, transmit {} us, total {} us",
                self.name,
                fps,
                self.worst.fill_us,
                self.worst.transmit_us,
                self.worst.total_us
            ),
            (None, Some(dropped)) => {
                log::info!("[{}] {} fps, {} frames dropped", self.name, fps, dropped)
            }
            (None, None) => log::info!("[{}] {} fps", self.name, fps),
        }
        *self = Self::new(self.name);
    }
}

// ----------------------------------------------------------------
// producer (core 0): capture, FFT and, in the copy variant, aggregation

#[embassy_executor::task]
pub async fn producer_task(
    i2s_peripherals: I2sPeripherals<'static>,
    config: &'static AppConfig,
    link: ProducerLink,
) -> ! {
    log::info!("Producer task started");
    match run_producer(i2s_peripherals, config, link).await {
        Err(e) => log::error!("Producer stopped: {e:?}"),
    }
    loop {
        Timer::after_secs(1).await;
    }
}

async fn run_producer(
    i2s_peripherals: I2sPeripherals<'static>,
    config: &'static AppConfig,
    link: ProducerLink,
) -> Result<!> {
    let (mut rx_buffer, rx_descriptors, _, _) = dma_buffers!(I2S_BUFFER_SIZE, 0);

    let i2s = esp_hal::i2s::master::I2s::new(
        i2s_peripherals.i2s0,
        i2s_peripherals.dma_ch0,
        esp_hal::i2s::master::Config::new_tdm_philips()
            .with_sample_rate(Rate::from_hz(config.capture.sample_rate_hz))
            .with_data_format(DataFormat::Data32Channel32),
    )
    .map_err(|err| error_with_location!("Failed to set up I2S: {:?}", err))?
    .with_mclk(i2s_peripherals.gpio0);

    let mut i2s_rx: esp_hal::i2s::master::I2sRx<'static, Blocking> = i2s
        .i2s_rx
        .with_bclk(i2s_peripherals.gpio4)
        .with_ws(i2s_peripherals.gpio6)
        .with_din(i2s_peripherals.gpio5)
        .build(rx_descriptors);

    let mut transfer = i2s_rx
        .read_dma_circular(&mut rx_buffer)
        .map_err(|err| error_with_location!("Failed to start I2S DMA: {:?}", err))?;

    let mut capture = I2sCapture::new(
        |out: &mut [u8]| {
            let available = transfer.available()?;
            if available == 0 {
                return Ok(0);
            }
            let take = available.min(out.len());
            transfer.pop(&mut out[..take])
        },
        config.capture.sample_rate_hz,
        static_buf!(u8, I2S_POP_SIZE),
    );

    let mut spectrum_stage = SpectrumStage::new(RealFft::new(), config);
    let samples = static_buf!(i16, FFT_SIZE);
    let mut stats = FrameStats::new("producer");

    match link {
        ProducerLink::Levels(exchange) => {
            let mut level_stage = LevelStage::from_config(config)
                .map_err(|err| error_with_location!("Invalid band config: {}", err))?;
            let spectrum = static_buf!(f32, common::SPECTRUM_LEN);
            let mut levels: BandLevels = [0; NUM_BAND];

            loop {
                let Some(captured) = capture_frame(&mut capture, &config.capture, samples).await
                else {
                    continue;
                };
                spectrum_stage.transform(&samples[..captured.samples], spectrum);
                level_stage.process(spectrum, &mut levels);

                // returns immediately when dropping frames
                while let Err(SlotBusy) = exchange.try_publish(&levels) {
                    Timer::after_micros(POLL_INTERVAL_US as u64).await;
                }
                stats.record(None, Some(exchange.dropped()));
            }
        }
        ProducerLink::Spectrum { handoff, buffer } => {
            let mut owned = Some(buffer);

            loop {
                let Some(captured) = capture_frame(&mut capture, &config.capture, samples).await
                else {
                    continue;
                };

                // the consumer may still be reading the previous spectrum
                let spectrum = match owned.take() {
                    Some(spectrum) => spectrum,
                    None => loop {
                        if let Some(spectrum) = handoff.try_reclaim() {
                            break spectrum;
                        }
                        Timer::after_micros(POLL_INTERVAL_US as u64).await;
                    },
                };
                spectrum_stage.transform(&samples[..captured.samples], &mut spectrum[..]);

                if let Err(spectrum) = handoff.publish(spectrum) {
                    log::error!("Spectrum handoff out of sync, keeping the buffer");
                    owned = Some(spectrum);
                }
                stats.record(None, None);
            }
        }
    }
}

/// Runs one capture cycle; errors are logged and yield `None`.
async fn capture_frame<S: SampleSource>(
    capture: &mut S,
    config: &CaptureConfig,
    out: &mut [i16],
) -> Option<Capture> {
    if let Err(err) = capture.start(config.channel, config.sample_rate_hz, FFT_SIZE) {
        log::error!("Failed to start capture: {err:?}");
        Timer::after_millis(100).await;
        return None;
    }
    while capture.busy() {
        Timer::after_micros(CAPTURE_POLL_US).await;
    }
    let result = capture.buffer(out);
    capture.close();

    match result {
        Ok(captured) => Some(captured),
        Err(err) => {
            log::error!("Capture failed: {err:?}");
            None
        }
    }
}

// ----------------------------------------------------------------
// consumer (core 1): [aggregation,] peak hold, render, transmit

#[embassy_executor::task]
pub async fn consumer_task(
    spi: SpiDmaBus<'static, Blocking>,
    peak_toggle: Input<'static>,
    config: &'static AppConfig,
    link: ConsumerLink,
) -> ! {
    log::info!("Consumer task started");
    match run_consumer(spi, peak_toggle, config, link).await {
        Err(e) => log::error!("Consumer stopped: {e:?}"),
    }
    loop {
        Timer::after_secs(1).await;
    }
}

async fn run_consumer(
    spi: SpiDmaBus<'static, Blocking>,
    peak_toggle: Input<'static>,
    config: &'static AppConfig,
    link: ConsumerLink,
) -> Result<!> {
    let mut display = DisplayStage::from_config(config)
        .map_err(|err| error_with_location!("Invalid matrix config: {}", err))?;

    let color_bytes = config.matrix.rows * config.matrix.cols * BYTES_PER_PIXEL;
    let encoded = Box::leak(vec![0u8; spi_buffer_len(color_bytes)].into_boxed_slice());
    let mut strip = Ws2812Spi::new(spi, encoded);
    display.clear(&mut strip)?;

    let clock = EmbassyClock;
    let mut stats = FrameStats::new("consumer");
    let mut levels: BandLevels = [0; NUM_BAND];

    let mut present = |levels: &BandLevels| {
        // read fresh every frame, no debouncing
        let show_peaks = peak_toggle.is_high();
        match display.show_timed(levels, show_peaks, &mut strip, &clock) {
            Ok(timing) => stats.record(Some(timing), None),
            Err(e) => log::error!("{e:?}"),
        }
    };

    match link {
        ConsumerLink::Levels(exchange) => loop {
            match exchange.try_take() {
                Some(frame) => present(&frame),
                None => Timer::after_micros(POLL_INTERVAL_US as u64).await,
            }
        },
        ConsumerLink::Spectrum(handoff) => {
            let mut level_stage = LevelStage::from_config(config)
                .map_err(|err| error_with_location!("Invalid band config: {}", err))?;

            loop {
                let Some(spectrum) = handoff.try_acquire() else {
                    Timer::after_micros(POLL_INTERVAL_US as u64).await;
                    continue;
                };
                level_stage.process(&spectrum[..], &mut levels);
                // aggregation is the last read of the spectrum
                if handoff.release(spectrum).is_err() {
                    log::error!("Spectrum handoff out of sync");
                }
                present(&levels);
            }
        }
    }
}
