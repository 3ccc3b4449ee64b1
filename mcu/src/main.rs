#![no_std]
#![no_main]
#![feature(never_type)]

extern crate alloc;
use alloc::format;
use embassy_executor::Spawner;
use esp_hal_embassy::Executor;
use log::{LevelFilter, info};

use core::{panic::PanicInfo, ptr::addr_of_mut};

use esp_hal::{
    dma::{DmaRxBuf, DmaTxBuf},
    dma_buffers,
    gpio::{Input, InputConfig, Pull},
    system::{CpuControl, Stack},
    time::Rate,
    timer::{AnyTimer, timg::TimerGroup},
};

use anyhow::{Result, anyhow};

use esp_hal::peripherals::Peripherals;

use static_cell::StaticCell;

use rtt_target::{ChannelMode, rprintln, rtt_init_print};

use common::config::{AppConfig, ExchangeMode};
use common::exchange::{FrameExchange, SpectrumHandoff};
use common::{NUM_BAND, SPECTRUM_LEN};

mod capture;
mod lights;
pub mod util;

mod ws2812;

use capture::I2sPeripherals;
use lights::*;

use util::*;

esp_bootloader_esp_idf::esp_app_desc!();

use esp_alloc as _;

#[inline(never)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    rprintln!("{}", info);
    log::error!("{info}");

    loop {
        // prevent optimization
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}

static mut APP_CORE_STACK: Stack<{ 16 * 1024 }> = Stack::new();

static HANDOFF: Handoff = SpectrumHandoff::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) -> ! {
    match _main(spawner).await {
        Err(e) => {
            log::error!("Error!");
            log::error!("{e:?}");
            loop {}
        }
    }
}

async fn _main(spawner: Spawner) -> Result<!> {
    esp_alloc::heap_allocator!(#[unsafe(link_section = ".dram2_uninit")] size: 64_000);

    // ---------------------------------------------------------------------------

    rtt_init_print!(ChannelMode::NoBlockTrim, 4 * 1024);

    static LOGGER: StaticCell<MultiLogger> = StaticCell::new();
    let logger = LOGGER.init(MultiLogger);

    log::set_logger(logger).map_err(|_| error_with_location!("Failed to set logger"))?;
    log::set_max_level(LevelFilter::Info);

    // ---------------------------------------------------------------------------

    static CONFIG: StaticCell<AppConfig> = StaticCell::new();
    let config = &*CONFIG.init(AppConfig::default());
    config
        .validate()
        .map_err(|err| error_with_location!("Refusing to start: {}", err))?;
    if let Ok(json) = config.to_json() {
        info!("[main] config: {json}");
    }

    let peripherals: Peripherals = esp_hal::init(esp_hal::Config::default()); // Note: 'default()' runs at 80 MHz (for the esp32-s3)

    let neopixel_data_pin = peripherals.GPIO21; // external 16x16 matrix

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timer0: AnyTimer = timg0.timer0.into();
    let timer1: AnyTimer = timg0.timer1.into();
    esp_hal_embassy::init([timer0, timer1]);

    // high (open, pulled up) shows the peak markers, tie to ground to hide them
    let peak_toggle = Input::new(
        peripherals.GPIO16,
        InputConfig::default().with_pull(Pull::Up),
    );

    // Neopixel setup:
    //  DMA TX buffer size:
    //    256 LEDs * 3 bytes (g r b) * 4 (4 SPI bytes are used for one ws2812 byte) + 140 reset bytes
    //    256 * 3 * 4 + 140 = 3212
    //    ==> round up to 4 kB
    let (rx_buffer, rx_descriptors, tx_buffer, tx_descriptors) = dma_buffers!(1, 4 * 1024);
    let dma_rx_buf = DmaRxBuf::new(rx_descriptors, rx_buffer)
        .map_err(|err| error_with_location!("Failed to create DMA RX buffer: {:?}", err))?;
    let dma_tx_buf = DmaTxBuf::new(tx_descriptors, tx_buffer)
        .map_err(|err| error_with_location!("Failed to create DMA TX buffer: {:?}", err))?;

    let spi: esp_hal::spi::master::SpiDmaBus<'_, esp_hal::Blocking> =
        esp_hal::spi::master::Spi::new(
            peripherals.SPI2,
            esp_hal::spi::master::Config::default().with_frequency(Rate::from_khz(4_500)),
        )?
        .with_mosi(neopixel_data_pin)
        .with_dma(peripherals.DMA_CH1)
        .with_buffers(dma_rx_buf, dma_tx_buf);

    let i2s_peripherals = I2sPeripherals {
        i2s0: peripherals.I2S0,
        dma_ch0: peripherals.DMA_CH0,
        gpio0: peripherals.GPIO0,
        gpio4: peripherals.GPIO4,
        gpio6: peripherals.GPIO6,
        gpio5: peripherals.GPIO5,
    };

    // the one cross-core slot
    let (producer_link, consumer_link) = match config.exchange {
        ExchangeMode::CopyLevels(policy) => {
            static LEVEL_EXCHANGE: StaticCell<LevelExchange> = StaticCell::new();
            let exchange = &*LEVEL_EXCHANGE.init(FrameExchange::new([0; NUM_BAND], policy));
            info!("[main] exchanging band levels, {policy:?}");
            (ProducerLink::Levels(exchange), ConsumerLink::Levels(exchange))
        }
        ExchangeMode::SpectrumHandoff => {
            info!("[main] handing the spectrum buffer to the render core");
            (
                ProducerLink::Spectrum {
                    handoff: &HANDOFF,
                    buffer: static_buf!(f32, SPECTRUM_LEN),
                },
                ConsumerLink::Spectrum(&HANDOFF),
            )
        }
    };

    // core 1: peak hold, render and transmit
    let mut cpu_control = CpuControl::new(peripherals.CPU_CTRL);
    let _guard = cpu_control
        .start_app_core(unsafe { &mut *addr_of_mut!(APP_CORE_STACK) }, move || {
            static EXECUTOR: StaticCell<Executor> = StaticCell::new();
            let executor = EXECUTOR.init(Executor::new());
            executor.run(|spawner| {
                spawner
                    .spawn(consumer_task(spi, peak_toggle, config, consumer_link))
                    .ok();
            });
        })
        .map_err(|err| error_with_location!("Failed to start the app core: {:?}", err))?;

    // core 0: capture and analysis
    spawner
        .spawn(producer_task(i2s_peripherals, config, producer_link))
        .map_err(|e| error_with_location!("Failed to spawn producer task: {:?}", e))?;

    // all processing is done in tasks
    loop {
        embassy_futures::yield_now().await;
    }
}
