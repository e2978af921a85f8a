//! FFI bindings for Snoozeless
//!
//! This module provides C-compatible functions for calling Snoozeless from other languages.
//! Requests and responses are JSON in C strings (null-terminated). Returned strings are
//! allocated by Rust and must be freed by the caller using `snoozeless_free_string`.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::SnoozelessConfig;
use crate::error::ComputeError;
use crate::forest::ForestConfig;
use crate::pipeline::{predict_sleep_quality, rank_feature_importance, SleepAnalyzer, SleepDataset};
use crate::types::{SleepAnswers, TargetField};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a result to a C string, recording the error on failure
fn json_result<T: Serialize>(result: Result<T, ComputeError>) -> *mut c_char {
    match result.and_then(|value| serde_json::to_string(&value).map_err(ComputeError::from)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

#[derive(Deserialize)]
struct PredictRequest {
    target: TargetField,
    answers: SleepAnswers,
    #[serde(default)]
    forest: ForestConfig,
}

#[derive(Deserialize)]
struct ImportanceRequest {
    target: TargetField,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    forest: ForestConfig,
}

// ============================================================================
// Stateless API
// ============================================================================

/// Load a study CSV, fit a fresh forest and predict for one user.
///
/// `request_json` has the shape
/// `{"target": "sleep_efficiency", "answers": {...}, "forest": {...}}`
/// where `forest` is optional.
///
/// # Safety
/// - `csv_path` and `request_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `snoozeless_free_string`.
/// - Returns NULL on error; call `snoozeless_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_predict(
    csv_path: *const c_char,
    request_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let path = match cstr_to_string(csv_path) {
        Some(s) => s,
        None => {
            set_last_error("Invalid CSV path pointer");
            return ptr::null_mut();
        }
    };

    let request = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid request string pointer");
            return ptr::null_mut();
        }
    };

    json_result(
        serde_json::from_str::<PredictRequest>(&request)
            .map_err(ComputeError::from)
            .and_then(|req| {
                let dataset = SleepDataset::load(&path)?;
                predict_sleep_quality(req.target, &dataset, &req.answers, &req.forest)
            }),
    )
}

/// Load a study CSV and rank features by importance for one target.
///
/// `request_json` has the shape
/// `{"target": "rem_percentage", "limit": 5, "forest": {...}}`
/// where `limit` and `forest` are optional.
///
/// # Safety
/// - `csv_path` and `request_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `snoozeless_free_string`.
/// - Returns NULL on error; call `snoozeless_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_importance(
    csv_path: *const c_char,
    request_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let path = match cstr_to_string(csv_path) {
        Some(s) => s,
        None => {
            set_last_error("Invalid CSV path pointer");
            return ptr::null_mut();
        }
    };

    let request = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid request string pointer");
            return ptr::null_mut();
        }
    };

    json_result(
        serde_json::from_str::<ImportanceRequest>(&request)
            .map_err(ComputeError::from)
            .and_then(|req| {
                let dataset = SleepDataset::load(&path)?;
                rank_feature_importance(req.target, &dataset, &req.forest, req.limit)
            }),
    )
}

// ============================================================================
// Stateful Analyzer API
// ============================================================================

/// Opaque handle to a SleepAnalyzer
pub struct SnoozelessAnalyzerHandle {
    analyzer: SleepAnalyzer,
}

/// Create an analyzer over a study CSV.
///
/// # Safety
/// - `csv_path` must be a valid null-terminated C string.
/// - `config_json` may be NULL for the default configuration.
/// - Returns a pointer that must be freed with `snoozeless_analyzer_free`.
/// - Returns NULL on error; call `snoozeless_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_analyzer_new(
    csv_path: *const c_char,
    config_json: *const c_char,
) -> *mut SnoozelessAnalyzerHandle {
    clear_last_error();

    let path = match cstr_to_string(csv_path) {
        Some(s) => s,
        None => {
            set_last_error("Invalid CSV path pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        SnoozelessConfig::default()
    } else {
        let parsed = cstr_to_string(config_json)
            .ok_or_else(|| ComputeError::InvalidInput("Invalid config string pointer".to_string()))
            .and_then(|json| SnoozelessConfig::from_json(&json));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match SleepAnalyzer::from_path(&path, config) {
        Ok(analyzer) => Box::into_raw(Box::new(SnoozelessAnalyzerHandle { analyzer })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `snoozeless_analyzer_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_analyzer_free(analyzer: *mut SnoozelessAnalyzerHandle) {
    if !analyzer.is_null() {
        drop(Box::from_raw(analyzer));
    }
}

/// Predict one target for a user with an analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `snoozeless_analyzer_new`.
/// - `target` and `answers_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `snoozeless_free_string`.
/// - Returns NULL on error; call `snoozeless_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_analyzer_predict(
    analyzer: *mut SnoozelessAnalyzerHandle,
    target: *const c_char,
    answers_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }

    let handle = &mut *analyzer;

    let target = match cstr_to_string(target) {
        Some(s) => s,
        None => {
            set_last_error("Invalid target string pointer");
            return ptr::null_mut();
        }
    };

    let answers = match cstr_to_string(answers_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid answers string pointer");
            return ptr::null_mut();
        }
    };

    json_result(target.parse::<TargetField>().and_then(|target| {
        let answers: SleepAnswers = serde_json::from_str(&answers)?;
        handle.analyzer.predict(target, &answers)
    }))
}

/// Rank features by importance for one target with an analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `snoozeless_analyzer_new`.
/// - `target` must be a valid null-terminated C string.
/// - `limit` <= 0 returns every feature.
/// - Returns a newly allocated string that must be freed with `snoozeless_free_string`.
/// - Returns NULL on error; call `snoozeless_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_analyzer_importance(
    analyzer: *mut SnoozelessAnalyzerHandle,
    target: *const c_char,
    limit: i32,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }

    let handle = &mut *analyzer;

    let target = match cstr_to_string(target) {
        Some(s) => s,
        None => {
            set_last_error("Invalid target string pointer");
            return ptr::null_mut();
        }
    };

    let limit = if limit <= 0 { None } else { Some(limit as usize) };

    json_result(
        target
            .parse::<TargetField>()
            .and_then(|target| handle.analyzer.importance_report(target, limit)),
    )
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Snoozeless functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Snoozeless function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Snoozeless function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Snoozeless library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn snoozeless_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticStudy;
    use std::path::PathBuf;

    struct TempCsv(PathBuf);

    impl TempCsv {
        fn new(rows: usize, seed: u64) -> Self {
            let path = std::env::temp_dir()
                .join(format!("snoozeless-ffi-{}.csv", uuid::Uuid::new_v4()));
            let csv = SyntheticStudy::generate(rows, seed).to_csv_string().unwrap();
            std::fs::write(&path, csv).unwrap();
            TempCsv(path)
        }

        fn c_path(&self) -> CString {
            CString::new(self.0.to_str().unwrap()).unwrap()
        }
    }

    impl Drop for TempCsv {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn answers_json() -> &'static str {
        r#"{
            "age": 25,
            "bedtime": 23.0,
            "wake_time": 7.0,
            "awakenings": 1,
            "caffeine_mg": 50,
            "alcohol_oz": 0,
            "exercise_count": 3,
            "sex": "male",
            "smoker": false
        }"#
    }

    #[test]
    fn test_ffi_predict() {
        let csv = TempCsv::new(30, 4);
        let request = CString::new(format!(
            r#"{{"target": "sleep_efficiency", "answers": {}, "forest": {{"n_trees": 10, "seed": 3}}}}"#,
            answers_json()
        ))
        .unwrap();

        unsafe {
            let result = snoozeless_predict(csv.c_path().as_ptr(), request.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["target"], "sleep_efficiency");
            assert_eq!(value["seed"], 3);
            assert!(value["value"].as_f64().is_some());

            snoozeless_free_string(result);
        }
    }

    #[test]
    fn test_ffi_importance() {
        let csv = TempCsv::new(30, 6);
        let request = CString::new(
            r#"{"target": "deep_percentage", "limit": 4, "forest": {"n_trees": 10, "seed": 1, "importance_rounds": 1}}"#,
        )
        .unwrap();

        unsafe {
            let result = snoozeless_importance(csv.c_path().as_ptr(), request.as_ptr());
            assert!(!result.is_null());

            let value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(value["features"].as_array().unwrap().len(), 4);

            snoozeless_free_string(result);
        }
    }

    #[test]
    fn test_ffi_analyzer_lifecycle() {
        let csv = TempCsv::new(30, 8);
        let config = CString::new(
            r#"{"forest": {"n_trees": 10, "seed": 2, "importance_rounds": 1}, "memoize_models": true}"#,
        )
        .unwrap();
        let target = CString::new("rem_percentage").unwrap();
        let answers = CString::new(answers_json()).unwrap();

        unsafe {
            let analyzer = snoozeless_analyzer_new(csv.c_path().as_ptr(), config.as_ptr());
            assert!(!analyzer.is_null());

            let prediction = snoozeless_analyzer_predict(analyzer, target.as_ptr(), answers.as_ptr());
            assert!(!prediction.is_null());
            let prediction_value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(prediction).to_str().unwrap()).unwrap();

            let report = snoozeless_analyzer_importance(analyzer, target.as_ptr(), 0);
            assert!(!report.is_null());
            let report_value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(report).to_str().unwrap()).unwrap();

            // memoised: both answers come from the same forest
            assert_eq!(prediction_value["model_id"], report_value["model_id"]);
            assert_eq!(report_value["features"].as_array().unwrap().len(), 10);

            snoozeless_free_string(prediction);
            snoozeless_free_string(report);
            snoozeless_analyzer_free(analyzer);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let csv = TempCsv::new(10, 1);
        let invalid = CString::new("not json").unwrap();

        unsafe {
            let result = snoozeless_predict(csv.c_path().as_ptr(), invalid.as_ptr());
            assert!(result.is_null());

            let error = snoozeless_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let missing = CString::new("/nonexistent/sleep.csv").unwrap();
            let analyzer = snoozeless_analyzer_new(missing.as_ptr(), ptr::null());
            assert!(analyzer.is_null());
            assert!(!snoozeless_last_error().is_null());

            let target = CString::new("light_percentage").unwrap();
            let result = snoozeless_analyzer_importance(ptr::null_mut(), target.as_ptr(), 0);
            assert!(result.is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = snoozeless_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::SNOOZELESS_VERSION);
        }
    }
}
