//! Sweep parameter space: injection rates and traffic-mix weight pairs.

use std::path::Path;

use crate::error::{Error, Result};
use crate::util::read_text_file;

/// A single injection rate.
///
/// The textual label from the rates file is kept verbatim because it names
/// aggregate files and report sheets; the parsed value drives the derived
/// packets-per-period field.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionRate {
    pub label: String,
    pub value: f64,
}

impl InjectionRate {
    /// Derived packets-per-period for this rate, `round(rate * ticks)`.
    pub fn packets_per_period(&self, period_size: u32) -> u32 {
        (self.value * period_size as f64).round() as u32
    }

    /// At rate 1.00 every tick of the period injects; the sweep holds an
    /// extra confirmation gate at this point.
    pub fn is_saturation(&self) -> bool {
        (self.value - 1.0).abs() < 1e-9
    }
}

/// One weight scenario: the accurate/approximate traffic mix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightPair {
    pub accurate: u32,
    pub approximate: u32,
}

/// Ordered sweep inputs. Order is significant: it fixes sheet order and
/// report layout.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    pub rates: Vec<InjectionRate>,
    pub weights: Vec<WeightPair>,
}

impl ParameterSpace {
    /// Loads the parameter space from the two newline-delimited input
    /// files. Unreadable or malformed inputs are campaign-fatal; nothing
    /// has been mutated yet at this stage.
    pub fn load(rates_path: &Path, weights_path: &Path) -> Result<Self> {
        let rates = load_rates(rates_path)?;
        let weights = load_weights(weights_path)?;
        Ok(ParameterSpace { rates, weights })
    }
}

fn input_err(path: &Path, reason: impl ToString) -> Error {
    Error::InputUnavailable {
        path: path.to_string_lossy().to_string(),
        reason: reason.to_string(),
    }
}

fn load_rates(path: &Path) -> Result<Vec<InjectionRate>> {
    let content = read_text_file(path).map_err(|e| input_err(path, e))?;
    let mut rates = Vec::new();
    for line in content.lines() {
        let label = line.trim();
        if label.is_empty() {
            continue;
        }
        let value: f64 = label
            .parse()
            .map_err(|e| input_err(path, format!("bad rate value `{}`: {}", label, e)))?;
        rates.push(InjectionRate {
            label: label.to_string(),
            value,
        });
    }
    if rates.is_empty() {
        return Err(input_err(path, "no injection rates listed"));
    }
    Ok(rates)
}

fn load_weights(path: &Path) -> Result<Vec<WeightPair>> {
    let content = read_text_file(path).map_err(|e| input_err(path, e))?;
    let mut weights = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split(',');
        let pair = match (parts.next(), parts.next(), parts.next()) {
            (Some(acc), Some(apx), None) => WeightPair {
                accurate: acc
                    .trim()
                    .parse()
                    .map_err(|e| input_err(path, format!("bad weight `{}`: {}", acc, e)))?,
                approximate: apx
                    .trim()
                    .parse()
                    .map_err(|e| input_err(path, format!("bad weight `{}`: {}", apx, e)))?,
            },
            _ => {
                return Err(input_err(
                    path,
                    format!("expected `accurate,approximate` pair, got `{}`", line),
                ))
            }
        };
        weights.push(pair);
    }
    if weights.is_empty() {
        return Err(input_err(path, "no weight scenarios listed"));
    }
    Ok(weights)
}

#[test]
fn space_from_input_files() {
    let dir = tempfile::tempdir().unwrap();
    let rates_path = dir.path().join("injectionrates.dat");
    let weights_path = dir.path().join("weights.dat");
    std::fs::write(&rates_path, "0.10\n0.20\n1.00\n").unwrap();
    std::fs::write(&weights_path, "80,20\n50,50\n").unwrap();

    let space = ParameterSpace::load(&rates_path, &weights_path).unwrap();
    assert_eq!(space.rates.len(), 3);
    assert_eq!(space.rates[0].label, "0.10");
    assert!(space.rates[2].is_saturation());
    assert_eq!(space.weights[0].accurate, 80);
    assert_eq!(space.weights[1].approximate, 50);
}

#[test]
fn packets_per_period_rounds() {
    let rate = InjectionRate {
        label: "0.25".to_string(),
        value: 0.25,
    };
    assert_eq!(rate.packets_per_period(10), 3);
    assert_eq!(rate.packets_per_period(100), 25);
}

#[test]
fn missing_rates_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let weights_path = dir.path().join("weights.dat");
    std::fs::write(&weights_path, "80,20\n").unwrap();
    let res = ParameterSpace::load(&dir.path().join("nope.dat"), &weights_path);
    assert!(matches!(res, Err(Error::InputUnavailable { .. })));
}

#[test]
fn malformed_weight_line_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let rates_path = dir.path().join("injectionrates.dat");
    let weights_path = dir.path().join("weights.dat");
    std::fs::write(&rates_path, "0.10\n").unwrap();
    std::fs::write(&weights_path, "80,20,5\n").unwrap();
    let res = ParameterSpace::load(&rates_path, &weights_path);
    assert!(matches!(res, Err(Error::InputUnavailable { .. })));
}
