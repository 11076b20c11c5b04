//! The production [`Board`]: relays and LEDs on GPIO, soil probes on an
//! ADS1115 bank (or the simulator), air sensor on the IIO bus.

use anyhow::{Context, Result};
use tracing::info;

use irrigation_sensors::dht::IioHumiditySensor;

#[cfg(feature = "adc")]
use irrigation_sensors::adc::Ads1115Bank;
#[cfg(all(feature = "sim", not(feature = "adc")))]
use irrigation_sensors::sim::SoilMoistureSim;
#[cfg(feature = "sim")]
use irrigation_sensors::sim::{ClimateSim, Scenario};

use crate::config::Config;
use crate::hal::Board;
use crate::indicator::{Status, StatusLed};
use crate::valve::ValveBoard;

#[cfg(not(any(feature = "adc", feature = "sim")))]
compile_error!("enable `adc` (ADS1115 probes) or `sim` (simulated probes)");

/// Wetness fractions the simulator maps onto 0 and 1.
#[cfg(all(feature = "sim", not(feature = "adc")))]
const SIM_VWC_DRY: f32 = 0.05;
#[cfg(all(feature = "sim", not(feature = "adc")))]
const SIM_VWC_WET: f32 = 0.6;

/// Deployment knobs that live outside the config file.
#[derive(Debug, Clone)]
pub(crate) struct BoardOptions {
    pub active_low: bool,
    pub dht_device: String,
    #[cfg_attr(not(feature = "adc"), allow(dead_code))]
    pub adc_address: u16,
    #[cfg_attr(not(feature = "sim"), allow(dead_code))]
    pub scenario: String,
}

#[cfg(feature = "adc")]
type SoilFrontEnd = Ads1115Bank;
#[cfg(all(feature = "sim", not(feature = "adc")))]
type SoilFrontEnd = SoilMoistureSim;

enum Climate {
    Iio(IioHumiditySensor),
    #[cfg(feature = "sim")]
    Sim {
        sim: ClimateSim,
        temperature: f32,
    },
    #[cfg_attr(feature = "sim", allow(dead_code))]
    Absent,
}

pub(crate) struct PiBoard {
    valves: ValveBoard,
    led: StatusLed,
    soil: SoilFrontEnd,
    climate: Climate,
    /// Probe channel per plot (index = plot - 1).
    channels: Vec<u8>,
}

impl PiBoard {
    pub fn new(cfg: &Config, opts: &BoardOptions) -> Result<Self> {
        let relay_gpio: Vec<u8> = cfg.plots.iter().map(|p| p.relay_gpio).collect();
        let channels: Vec<u8> = cfg.plots.iter().map(|p| p.channel).collect();

        let valves = ValveBoard::new(&relay_gpio, opts.active_low).context("relay setup")?;
        let led = StatusLed::new(cfg.status_led.green_gpio, cfg.status_led.red_gpio)
            .context("status led setup")?;
        let soil = soil_front_end(cfg, &channels, opts)?;
        let climate = climate_source(opts);

        Ok(Self {
            valves,
            led,
            soil,
            climate,
            channels,
        })
    }
}

#[cfg(feature = "adc")]
fn soil_front_end(_cfg: &Config, _channels: &[u8], opts: &BoardOptions) -> Result<SoilFrontEnd> {
    Ads1115Bank::new(opts.adc_address).context("ads1115 setup")
}

#[cfg(all(feature = "sim", not(feature = "adc")))]
fn soil_front_end(cfg: &Config, channels: &[u8], opts: &BoardOptions) -> Result<SoilFrontEnd> {
    let scenario = Scenario::from_str_lossy(&opts.scenario);
    let count = channels.iter().max().map_or(0, |&c| c as usize + 1);
    let cal = &cfg.calibration;
    info!(%scenario, channels = count, "[sim] soil probes");
    Ok(SoilMoistureSim::new(
        scenario,
        count,
        cal.raw_for(SIM_VWC_DRY) as f64,
        cal.raw_for(SIM_VWC_WET) as f64,
        cal.adc_max,
    ))
}

fn climate_source(opts: &BoardOptions) -> Climate {
    let iio = IioHumiditySensor::new(&opts.dht_device);
    if iio.is_present() {
        info!(device = %opts.dht_device, "humidity sensor found");
        return Climate::Iio(iio);
    }

    #[cfg(feature = "sim")]
    {
        let scenario = Scenario::from_str_lossy(&opts.scenario);
        info!(%scenario, "[sim] humidity sensor");
        Climate::Sim {
            sim: ClimateSim::new(scenario),
            temperature: f32::NAN,
        }
    }
    #[cfg(not(feature = "sim"))]
    {
        tracing::warn!(device = %opts.dht_device, "no humidity sensor, air readings will be NaN");
        Climate::Absent
    }
}

impl PiBoard {
    /// Simulated probes get wetter while their valve is open.
    #[cfg(not(feature = "adc"))]
    fn water(&mut self, channel: u8, open: bool) {
        self.soil.set_watering(channel as usize, open);
    }

    #[cfg(feature = "adc")]
    fn water(&mut self, _channel: u8, _open: bool) {}
}

impl Board for PiBoard {
    fn read_channel(&mut self, channel: u8) -> Result<u16> {
        #[cfg(feature = "adc")]
        {
            self.soil.read_channel(channel)
        }
        #[cfg(not(feature = "adc"))]
        {
            Ok(self.soil.sample(channel as usize))
        }
    }

    fn set_relay(&mut self, plot: usize, open: bool) {
        self.valves.set(plot, open);
        if let Some(&ch) = plot.checked_sub(1).and_then(|i| self.channels.get(i)) {
            self.water(ch, open);
        }
    }

    fn set_status(&mut self, status: Status) {
        self.led.set(status);
    }

    fn read_humidity(&mut self) -> f32 {
        match &mut self.climate {
            Climate::Iio(s) => s.read_humidity(),
            #[cfg(feature = "sim")]
            Climate::Sim { sim, temperature } => {
                let (h, t) = sim.sample();
                *temperature = t;
                h
            }
            Climate::Absent => f32::NAN,
        }
    }

    fn read_temperature(&mut self) -> f32 {
        match &mut self.climate {
            Climate::Iio(s) => s.read_temperature(),
            // Sampled together with humidity.
            #[cfg(feature = "sim")]
            Climate::Sim { temperature, .. } => *temperature,
            Climate::Absent => f32::NAN,
        }
    }

    fn close_all(&mut self) {
        self.valves.close_all();
        for ch in self.channels.clone() {
            self.water(ch, false);
        }
    }
}
