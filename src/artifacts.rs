//! On-disk artifacts of a training run.
//!
//! Per window directory:
//!
//! | file                      | contents                                   |
//! |---------------------------|--------------------------------------------|
//! | `log (loss, error).csv`   | `loss, error` or `loss, error, best_error` |
//! | `params.npy`              | flat parameter vector                      |
//! | `total runtime (sec).csv` | one float, `%.18e`                         |
//! | `config.json`             | resolved run configuration                 |
//! | `next_ic.npz`             | terminal prediction for the next window    |
//!
//! The parent directory holds `best_error.csv`, written after the last
//! window. Floats in the text files follow Python's `repr` so the files are
//! interchangeable with ones produced by the NumPy tooling.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use ndarray::Array1;
use ndarray_npy::{read_npy, write_npy};
use serde::Serialize;

use crate::error::{PinnError, Result};

pub const LOG_FILE: &str = "log (loss, error).csv";
pub const PARAMS_FILE: &str = "params.npy";
pub const RUNTIME_FILE: &str = "total runtime (sec).csv";
pub const BEST_ERROR_FILE: &str = "best_error.csv";
pub const CONFIG_FILE: &str = "config.json";
pub const NEXT_IC_FILE: &str = "next_ic.npz";

/// Python `repr(float)`: shortest round-trip digits, scientific notation
/// outside `1e-4 ≤ |v| < 1e16`.
pub fn py_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if v != 0.0 {
        let sci = format!("{v:e}");
        if let Some((mantissa, exp)) = sci.split_once('e') {
            if let Ok(exp) = exp.parse::<i32>() {
                if !(-4..16).contains(&exp) {
                    return format!("{mantissa}{}", py_exponent(exp));
                }
            }
        }
    }
    let plain = v.to_string();
    if plain.contains('.') {
        plain
    } else {
        plain + ".0"
    }
}

/// NumPy `savetxt` default format `%.18e`.
pub fn savetxt_repr(v: f64) -> String {
    if !v.is_finite() {
        return py_repr(v);
    }
    let sci = format!("{v:.18e}");
    match sci.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(exp) => format!("{mantissa}{}", py_exponent(exp)),
            Err(_) => sci,
        },
        None => sci,
    }
}

fn py_exponent(exp: i32) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    format!("e{sign}{:02}", exp.abs())
}

fn list_repr(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|&v| py_repr(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Remove leftovers of an earlier run. Missing files are fine.
pub fn clear_stale(paths: &[&Path]) -> Result<()> {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("removed stale {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PinnError::io(path, e)),
        }
    }
    Ok(())
}

/// Append one `loss, error[, best_error]` row.
pub fn append_log(path: &Path, loss: f64, error: f64, best_error: Option<f64>) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PinnError::io(path, e))?;
    let row = match best_error {
        Some(best) => format!("{}, {}, {}", py_repr(loss), py_repr(error), py_repr(best)),
        None => format!("{}, {}", py_repr(loss), py_repr(error)),
    };
    writeln!(file, "{row}").map_err(|e| PinnError::io(path, e))
}

pub fn save_params(path: &Path, params: &Array1<f64>) -> Result<()> {
    write_npy(path, params).map_err(|e| PinnError::npy(path, e))
}

pub fn load_params(path: &Path) -> Result<Array1<f64>> {
    read_npy(path).map_err(|e| PinnError::npy(path, e))
}

pub fn save_runtime(path: &Path, seconds: f64) -> Result<()> {
    fs::write(path, format!("{}\n", savetxt_repr(seconds))).map_err(|e| PinnError::io(path, e))
}

pub fn save_config<T: Serialize>(path: &Path, config: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(config).map_err(|e| PinnError::Config(e.to_string()))?;
    fs::write(path, json).map_err(|e| PinnError::io(path, e))
}

/// Last token of the last row of a window log: the final error, or the
/// best error once the log carries that column.
pub fn read_final_error(path: &Path) -> Result<f64> {
    let text = fs::read_to_string(path).map_err(|e| PinnError::io(path, e))?;
    let malformed = |message: String| PinnError::MalformedLog {
        path: path.to_path_buf(),
        message,
    };
    let last_row = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| malformed("log has no rows".into()))?;
    let token = last_row
        .rsplit(' ')
        .next()
        .ok_or_else(|| malformed(format!("empty row {last_row:?}")))?;
    token
        .trim()
        .parse::<f64>()
        .map_err(|e| malformed(format!("cannot parse {token:?}: {e}")))
}

/// Append the per-window error list and their mean. Returns the mean.
pub fn write_best_error(path: &Path, errors: &[f64]) -> Result<f64> {
    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PinnError::io(path, e))?;
    writeln!(file, "test error for each time window: {}", list_repr(errors))
        .and_then(|()| writeln!(file, "total error: {}", py_repr(mean)))
        .map_err(|e| PinnError::io(path, e))?;
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn floats_print_like_python() {
        assert_eq!(py_repr(3.0), "3.0");
        assert_eq!(py_repr(0.1), "0.1");
        assert_eq!(py_repr(-0.0), "-0.0");
        assert_eq!(py_repr(1e-5), "1e-05");
        assert_eq!(py_repr(2.5e-7), "2.5e-07");
        assert_eq!(py_repr(0.0001), "0.0001");
        assert_eq!(py_repr(1e16), "1e+16");
        assert_eq!(py_repr(123456.75), "123456.75");
        assert_eq!(py_repr(f64::NAN), "nan");
        assert_eq!(py_repr(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn runtime_prints_like_savetxt() {
        assert_eq!(savetxt_repr(12.5), "1.250000000000000000e+01");
        assert_eq!(savetxt_repr(0.0), "0.000000000000000000e+00");
        assert_eq!(savetxt_repr(0.005), "5.000000000000000104e-03");
    }

    #[test]
    fn log_rows_gain_best_error_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        append_log(&path, 1.5, 0.25, None).unwrap();
        append_log(&path, 0.75, 0.125, Some(0.1)).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1.5, 0.25\n0.75, 0.125, 0.1\n");
        assert_eq!(read_final_error(&path).unwrap(), 0.1);
    }

    #[test]
    fn final_error_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert!(matches!(read_final_error(&missing), Err(PinnError::Io { .. })));

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "").unwrap();
        assert!(matches!(read_final_error(&empty), Err(PinnError::MalformedLog { .. })));

        let garbage = dir.path().join("garbage.csv");
        fs::write(&garbage, "0.1, oops\n").unwrap();
        assert!(matches!(read_final_error(&garbage), Err(PinnError::MalformedLog { .. })));
    }

    #[test]
    fn best_error_file_lists_windows_and_mean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BEST_ERROR_FILE);
        let mean = write_best_error(&path, &[0.5, 0.25]).unwrap();
        assert_eq!(mean, 0.375);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "test error for each time window: [0.5, 0.25]\ntotal error: 0.375\n"
        );
    }

    #[test]
    fn params_reload_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PARAMS_FILE);
        let params = array![0.1, -2.0, 3.5e-9];
        save_params(&path, &params).unwrap();
        assert_eq!(load_params(&path).unwrap(), params);
    }

    #[test]
    fn clearing_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join(LOG_FILE);
        fs::write(&present, "1.0, 2.0\n").unwrap();
        clear_stale(&[&present, &dir.path().join(BEST_ERROR_FILE)]).unwrap();
        assert!(!present.exists());
    }
}
