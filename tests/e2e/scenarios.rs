use serde_json::json;

use super::harness::{TestContext, UNREACHABLE_BASE_URL, parse_json, write_file};

pub struct Scenario {
    pub name: &'static str,
    pub run: fn(&TestContext) -> Result<(), String>,
}

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "help_output",
            run: scenario_help,
        },
        Scenario {
            name: "no_args_error",
            run: scenario_no_args,
        },
        Scenario {
            name: "list_text",
            run: scenario_list_text,
        },
        Scenario {
            name: "list_json",
            run: scenario_list_json,
        },
        Scenario {
            name: "unknown_scenario",
            run: scenario_unknown_scenario,
        },
        Scenario {
            name: "suffix_needs_single_scenario",
            run: scenario_suffix_needs_single,
        },
        Scenario {
            name: "invalid_suffix",
            run: scenario_invalid_suffix,
        },
        Scenario {
            name: "missing_config_file",
            run: scenario_missing_config,
        },
        Scenario {
            name: "malformed_config_file",
            run: scenario_malformed_config,
        },
        Scenario {
            name: "wait_times_out",
            run: scenario_wait_times_out,
        },
        Scenario {
            name: "base_url_from_env",
            run: scenario_base_url_from_env,
        },
        Scenario {
            name: "unreachable_service_text",
            run: scenario_unreachable_text,
        },
        Scenario {
            name: "unreachable_service_json",
            run: scenario_unreachable_json,
        },
    ]
}

fn scenario_help(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("help")?;
    let output = ctx.run_eduprobe(&env, &["--help"])?;
    output.assert_success()?;
    output.assert_stdout_contains("run")?;
    output.assert_stdout_contains("wait")?;
    output.assert_stdout_contains("--base-url")?;
    Ok(())
}

fn scenario_no_args(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("no-args")?;
    let output = ctx.run_eduprobe(&env, &[])?;
    output.assert_failure()?;
    output.assert_stderr_contains("No command specified")?;
    Ok(())
}

fn scenario_list_text(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("list")?;
    let output = ctx.run_eduprobe(&env, &["list"])?;
    output.assert_success()?;
    for name in [
        "course_flow",
        "teacher_admin",
        "upload_boundary",
        "notifications",
        "teacher_dashboard",
        "question_search",
    ] {
        output.assert_stdout_contains(name)?;
    }
    Ok(())
}

fn scenario_list_json(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("list-json")?;
    let output = ctx.run_eduprobe(&env, &["list", "--json"])?;
    output.assert_success()?;
    let value = parse_json(&output.stdout)?;
    let entries = value
        .as_array()
        .ok_or_else(|| format!("Expected a JSON array, got: {}", value))?;
    if entries.len() != 6 {
        return Err(format!("Expected 6 scenarios, got {}", entries.len()));
    }
    if entries[0]["name"] != "course_flow" || entries[0]["steps"] != 14 {
        return Err(format!("Unexpected first entry: {}", entries[0]));
    }
    Ok(())
}

fn scenario_unknown_scenario(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("unknown")?;
    let output = ctx.run_eduprobe(&env, &["run", "nope", "--no-wait"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("Unknown scenario 'nope'")?;
    output.assert_stderr_contains("course_flow")?;
    output.assert_stdout_not_contains("PASS")?;
    Ok(())
}

fn scenario_suffix_needs_single(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("suffix-multi")?;
    let output = ctx.run_eduprobe(
        &env,
        &[
            "run",
            "course_flow",
            "notifications",
            "--suffix",
            "abc123",
            "--no-wait",
        ],
    )?;
    output.assert_failure()?;
    output.assert_stderr_contains("--suffix requires exactly one scenario")?;

    let output = ctx.run_eduprobe(&env, &["run", "--suffix", "abc123", "--no-wait"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("--suffix requires exactly one scenario")?;
    Ok(())
}

fn scenario_invalid_suffix(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("bad-suffix")?;
    let output = ctx.run_eduprobe(
        &env,
        &["run", "course_flow", "--suffix", "abc-123", "--no-wait"],
    )?;
    output.assert_failure()?;
    output.assert_stderr_contains("Invalid suffix 'abc-123'")?;
    Ok(())
}

fn scenario_missing_config(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("missing-config")?;
    let missing = env.root.join("absent.json");
    let missing = missing.to_string_lossy();
    let output = ctx.run_eduprobe(&env, &["--config", &missing, "wait", "--attempts", "1"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("does not exist")?;
    Ok(())
}

fn scenario_malformed_config(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("malformed-config")?;
    let path = env.root.join("broken.json");
    write_file(&path, "{ \"base_url\": ")?;
    let path = path.to_string_lossy();
    let output = ctx.run_eduprobe(&env, &["--config", &path, "wait", "--attempts", "1"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("Failed to parse config file")?;
    Ok(())
}

fn scenario_wait_times_out(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("wait")?;
    env.write_config(&json!({ "base_url": UNREACHABLE_BASE_URL, "timeout_seconds": 2 }))?;
    let output = ctx.run_eduprobe(&env, &["wait", "--attempts", "2", "--interval", "0"])?;
    output.assert_failure()?;
    output.assert_stdout_contains("did not respond after 2 attempts")?;

    let output = ctx.run_eduprobe(
        &env,
        &["wait", "--attempts", "1", "--interval", "0", "--json"],
    )?;
    output.assert_failure()?;
    let value = parse_json(&output.stdout)?;
    if value["state"] != "timed_out" || value["attempts"] != 1 {
        return Err(format!("Unexpected readiness JSON: {}", value));
    }
    Ok(())
}

fn scenario_base_url_from_env(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("env-url")?;
    let output = ctx.run_eduprobe_with(
        &env,
        &["wait", "--attempts", "1", "--interval", "0"],
        &[("EDUPROBE_BASE_URL", UNREACHABLE_BASE_URL), ("EDUPROBE_TIMEOUT", "2")],
    )?;
    output.assert_failure()?;
    output.assert_stdout_contains(UNREACHABLE_BASE_URL)?;
    Ok(())
}

fn scenario_unreachable_text(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("unreachable")?;
    let output = ctx.run_eduprobe(
        &env,
        &[
            "run",
            "upload_boundary",
            "--suffix",
            "abc123",
            "--no-wait",
            "--base-url",
            UNREACHABLE_BASE_URL,
            "--timeout",
            "2",
        ],
    )?;
    output.assert_failure()?;
    output.assert_stdout_contains("upload_boundary")?;
    output.assert_stdout_contains("FAIL register_teacher: transport failure")?;
    output.assert_stdout_contains("SKIP login_teacher (missing: register_teacher.ok)")?;
    output.assert_stdout_contains("0 passed, 1 failed, 2 skipped")?;
    Ok(())
}

fn scenario_unreachable_json(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("unreachable-json")?;
    let output = ctx.run_eduprobe(
        &env,
        &[
            "run",
            "notifications",
            "--no-wait",
            "--json",
            "--base-url",
            UNREACHABLE_BASE_URL,
            "--timeout",
            "2",
        ],
    )?;
    output.assert_failure()?;
    let value = parse_json(&output.stdout)?;
    if value["passed"] != 0 || value["failed"] != 1 {
        return Err(format!("Unexpected tally: {}", value));
    }
    let steps = &value["scenarios"][0]["steps"];
    if steps[0]["outcome"] != "transport_failure" || steps[1]["outcome"] != "skipped" {
        return Err(format!("Unexpected steps: {}", steps));
    }
    Ok(())
}
