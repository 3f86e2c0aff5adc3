//! fxpid - JSON Test Vector Harness
//!
//! Runs test vectors from the spec/test-vectors directory and outputs
//! JSON results. Raw Q16.16 bits are compared exactly so results can be
//! cross-checked bit for bit against other implementations.
//!
//! Usage: `test_harness spec/test-vectors/*.json`

use fxpid::{
    fixed32::Fixed32,
    pid::{FixedPid, Limits, PidConfig},
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{env, fs, path::Path};

// Use std Result to avoid conflict with fxpid::Result
type Result<T> = std::result::Result<T, String>;

// ============================================================================
// Test Vector Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TestVector {
    id: String,
    #[serde(default)]
    #[allow(dead_code)]
    name: String,
    module: String,
    function: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: String,
    #[serde(default)]
    setup: Option<Value>,
    input: Value,
    expected: Value,
    #[serde(default)]
    #[allow(dead_code)]
    notes: Vec<String>,
}

/// A file holds either one vector or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VectorFile {
    Many(Vec<TestVector>),
    One(TestVector),
}

#[derive(Debug, Serialize)]
struct TestResult {
    id: String,
    module: String,
    function: String,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<Value>,
}

// ============================================================================
// Per-Vector State
// ============================================================================

#[derive(Default)]
struct TestState {
    config: Option<PidConfig>,
}

impl TestState {
    fn reset(&mut self) {
        self.config = None;
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: test_harness <test_vector.json> [test_vector2.json ...]");
        std::process::exit(1);
    }

    let mut all_results: Vec<TestResult> = Vec::new();
    let mut state = TestState::default();

    for path in &args[1..] {
        match run_test_file(path, &mut state) {
            Ok(results) => all_results.extend(results),
            Err(e) => {
                all_results.push(TestResult {
                    id: Path::new(path)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown")
                        .to_string(),
                    module: "harness".to_string(),
                    function: "load".to_string(),
                    passed: false,
                    error: Some(format!("Failed to load test file: {}", e)),
                    actual: None,
                });
            }
        }
    }

    // Output JSON results
    match serde_json::to_string_pretty(&all_results) {
        Ok(out) => println!("{}", out),
        Err(e) => eprintln!("Failed to serialize results: {}", e),
    }

    // Summary to stderr
    let passed = all_results.iter().filter(|r| r.passed).count();
    let total = all_results.len();
    eprintln!("\n=== Test Summary ===");
    eprintln!(
        "Passed: {}/{} ({:.1}%)",
        passed,
        total,
        100.0 * passed as f64 / total.max(1) as f64
    );

    if passed != total {
        std::process::exit(2);
    }
}

fn run_test_file(path: &str, state: &mut TestState) -> Result<Vec<TestResult>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;

    let file: VectorFile = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path, e))?;

    let vectors = match file {
        VectorFile::Many(v) => v,
        VectorFile::One(v) => vec![v],
    };

    let mut results = Vec::with_capacity(vectors.len());
    for vector in &vectors {
        state.reset();
        if let Some(setup) = &vector.setup {
            if let Err(e) = handle_setup(setup, state) {
                results.push(failed(vector, e));
                continue;
            }
        }
        results.push(dispatch_test(vector, state));
    }
    Ok(results)
}

fn handle_setup(setup: &Value, state: &mut TestState) -> Result<()> {
    if let Some(config) = setup.get("config") {
        state.config = Some(parse_config(config)?);
    }
    Ok(())
}

/// Read a Q16.16 value given either as `<name>_bits` or as a float `<name>`
fn fixed_field(obj: &Value, name: &str) -> Result<Fixed32> {
    if let Some(bits) = obj.get(format!("{}_bits", name)).and_then(|v| v.as_i64()) {
        let bits = i32::try_from(bits).map_err(|_| format!("{}_bits out of range", name))?;
        return Ok(Fixed32::from_bits(bits));
    }
    obj.get(name)
        .and_then(|v| v.as_f64())
        .map(Fixed32::from_f64)
        .ok_or_else(|| format!("Missing {}", name))
}

fn bits_field(obj: &Value, name: &str) -> Result<Fixed32> {
    let raw = obj
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| format!("Missing {}", name))?;
    i32::try_from(raw)
        .map(Fixed32::from_bits)
        .map_err(|_| format!("{} out of range", name))
}

fn parse_config(config: &Value) -> Result<PidConfig> {
    let mut parsed = PidConfig::new(
        fixed_field(config, "kp")?,
        fixed_field(config, "ki")?,
        fixed_field(config, "kd")?,
        fixed_field(config, "dt")?,
    )
    .with_output_limits(fixed_field(config, "min")?, fixed_field(config, "max")?);

    if let Some(limits) = config.get("integral_limits") {
        parsed.integral_limits = Some(Limits::new(
            fixed_field(limits, "min")?,
            fixed_field(limits, "max")?,
        ));
    }
    Ok(parsed)
}

fn dispatch_test(vector: &TestVector, state: &mut TestState) -> TestResult {
    let result = match (vector.module.as_str(), vector.function.as_str()) {
        // Fixed-point primitives
        ("fixed32", "from_float") => test_from_float(vector),
        ("fixed32", "from_int") => test_from_int(vector),
        ("fixed32", "frac") => test_frac(vector),
        ("fixed32", "mul") => test_mul(vector),
        ("fixed32", "div") => test_div(vector),

        // PID controller
        ("pid", "calculate") => test_pid_calculate(vector, state),
        ("pid", "validate") => test_pid_validate(state),

        _ => Err(format!("No handler for {}.{}", vector.module, vector.function)),
    };

    match result {
        Ok(actual) => {
            // Compare with expected
            let passed = compare_results(&vector.expected, &actual);
            TestResult {
                id: vector.id.clone(),
                module: vector.module.clone(),
                function: vector.function.clone(),
                passed,
                error: if passed { None } else { Some("Result mismatch".to_string()) },
                actual: if passed { None } else { Some(actual) },
            }
        }
        Err(e) => failed(vector, e),
    }
}

fn failed(vector: &TestVector, error: String) -> TestResult {
    TestResult {
        id: vector.id.clone(),
        module: vector.module.clone(),
        function: vector.function.clone(),
        passed: false,
        error: Some(error),
        actual: None,
    }
}

// ============================================================================
// Fixed-Point Tests
// ============================================================================

fn test_from_float(vector: &TestVector) -> Result<Value> {
    let float_val = vector
        .input
        .get("float")
        .and_then(|v| v.as_f64())
        .ok_or("Missing float")?;

    let fixed = Fixed32::from_f64(float_val);

    Ok(json!({
        "return": "OK",
        "bits": fixed.to_bits(),
        "round_trip": fixed.to_f64(),
    }))
}

fn test_from_int(vector: &TestVector) -> Result<Value> {
    let n = vector
        .input
        .get("int")
        .and_then(|v| v.as_i64())
        .ok_or("Missing int")?;
    let n = i32::try_from(n).map_err(|_| "int out of range".to_string())?;

    Ok(json!({
        "return": "OK",
        "bits": Fixed32::from_int(n).to_bits(),
    }))
}

fn test_frac(vector: &TestVector) -> Result<Value> {
    let a = bits_field(&vector.input, "bits")?;

    Ok(json!({
        "return": "OK",
        "frac": a.frac(),
    }))
}

fn test_mul(vector: &TestVector) -> Result<Value> {
    let a = bits_field(&vector.input, "a_bits")?;
    let b = bits_field(&vector.input, "b_bits")?;

    Ok(json!({
        "return": "OK",
        "bits": (a * b).to_bits(),
    }))
}

fn test_div(vector: &TestVector) -> Result<Value> {
    let a = bits_field(&vector.input, "a_bits")?;
    let b = bits_field(&vector.input, "b_bits")?;

    match a.checked_div(b) {
        Some(q) => Ok(json!({
            "return": "OK",
            "bits": q.to_bits(),
        })),
        None => Ok(json!({
            "return": "ZeroDivisor"
        })),
    }
}

// ============================================================================
// PID Tests
// ============================================================================

fn test_pid_calculate(vector: &TestVector, state: &mut TestState) -> Result<Value> {
    let config = state.config.ok_or("PID config not set up")?;
    let mut pid = FixedPid::with_config(&config);

    let steps = vector
        .input
        .get("steps")
        .and_then(|v| v.as_array())
        .ok_or("Missing steps")?;

    let mut outputs = Vec::with_capacity(steps.len());
    for step in steps {
        let setpoint = bits_field(step, "setpoint")?;
        let measured = bits_field(step, "measured")?;
        outputs.push(pid.calculate(setpoint, measured).to_bits());
    }

    Ok(json!({
        "return": "OK",
        "outputs": outputs,
        "integral": pid.integral().to_bits(),
        "prev_error": pid.prev_error().to_bits(),
    }))
}

fn test_pid_validate(state: &TestState) -> Result<Value> {
    let config = state.config.ok_or("PID config not set up")?;

    match config.validate() {
        Ok(()) => Ok(json!({ "return": "OK" })),
        Err(e) => Ok(json!({ "return": format!("{:?}", e) })),
    }
}

// ============================================================================
// Result Comparison
// ============================================================================

fn compare_results(expected: &Value, actual: &Value) -> bool {
    // Check return value only if expected specifies it
    if let Some(exp_return) = expected.get("return").and_then(|v| v.as_str()) {
        let act_return = actual.get("return").and_then(|v| v.as_str()).unwrap_or("");

        if normalize_error(exp_return) != normalize_error(act_return) {
            return false;
        }

        // If return is error, don't check other fields
        if exp_return != "OK" {
            return true;
        }
    }

    compare_values(expected, actual)
}

fn normalize_error(s: &str) -> &str {
    match s {
        "ERR_ZERO_INTERVAL" | "ZeroInterval" => "ZeroInterval",
        "ERR_INVERTED_LIMITS" | "InvertedLimits" => "InvertedLimits",
        "ERR_DIV_ZERO" | "ZeroDivisor" => "ZeroDivisor",
        _ => s,
    }
}

fn compare_values(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(exp_map), Value::Object(act_map)) => {
            for (key, exp_val) in exp_map {
                if key == "return" {
                    continue; // Already checked
                }
                match act_map.get(key) {
                    Some(act_val) if compare_values(exp_val, act_val) => {}
                    _ => return false,
                }
            }
            true
        }
        (Value::Number(exp), Value::Number(act)) => {
            // Raw bits must match exactly
            if let (Some(e), Some(a)) = (exp.as_i64(), act.as_i64()) {
                return e == a;
            }
            let exp_f = exp.as_f64().unwrap_or(0.0);
            let act_f = act.as_f64().unwrap_or(0.0);

            // Within one Q16.16 ULP for real values
            (exp_f - act_f).abs() <= 1.0 / 65536.0
        }
        (Value::Bool(exp), Value::Bool(act)) => exp == act,
        (Value::String(exp), Value::String(act)) => exp == act,
        (Value::Array(exp), Value::Array(act)) => {
            exp.len() == act.len()
                && exp.iter().zip(act.iter()).all(|(e, a)| compare_values(e, a))
        }
        _ => false,
    }
}
