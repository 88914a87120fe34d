use bmad_installer::{InstallPlan, InstallResult, Status, UninstallReport};

use super::OutputFormat;

pub fn format_plan(plan: &InstallPlan) -> String {
    let mut out = format!(
        "Plan: {} in {} ({})\n",
        plan.action,
        plan.project_root.display(),
        plan.bmad_folder
    );
    if !plan.modules.is_empty() {
        let modules: Vec<String> = plan
            .modules
            .iter()
            .map(|m| match &m.installed {
                Some(installed) if installed != &m.version => {
                    format!("{} {} -> {}", m.code, installed, m.version)
                }
                _ => format!("{} {}", m.code, m.version),
            })
            .collect();
        out.push_str(&format!("  Modules: {}\n", modules.join(", ")));
    }
    let ides = if plan.ides.is_empty() {
        "(none)".to_string()
    } else {
        plan.ides.join(", ")
    };
    out.push_str(&format!("  IDEs:    {ides}\n"));
    out.push_str(&format!("  Output:  {}", plan.settings.output_folder));
    out
}

pub fn format_install_result(result: &InstallResult, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
        OutputFormat::Text => format_install_result_text(result),
    }
}

fn format_install_result_text(result: &InstallResult) -> String {
    if result.cancelled {
        return "Cancelled; nothing was changed.".to_string();
    }
    let action = result
        .action
        .map(|a| a.to_string())
        .unwrap_or_else(|| "install".to_string());

    let mut out = String::new();
    out.push_str(&format!("\u{2714} {action} complete\n"));
    out.push_str(&format!(
        "  Modules:       {} ({})\n",
        result.modules.join(", "),
        result.module_count
    ));
    out.push_str(&format!("  Agents:        {}\n", result.agent_count));
    out.push_str(&format!("  Command files: {}", result.generated.len()));
    push_warnings(&mut out, &result.warnings);
    out
}

pub fn format_uninstall_report(report: &UninstallReport, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = String::new();
            for phase in &report.completed {
                out.push_str(&format!("\u{2714} Removed {phase}\n"));
            }
            if let Some((phase, reason)) = &report.failed {
                out.push_str(&format!("\u{2718} {phase} failed and was rolled back: {reason}\n"));
            }
            out.push_str(&format!("{} path(s) removed", report.removed.len()));
            out
        }
    }
}

pub fn format_status(status: &Status, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(status).unwrap_or_default(),
        OutputFormat::Text => format_status_text(status),
    }
}

fn format_status_text(status: &Status) -> String {
    let Status::Installed(status) = status else {
        return "Not installed.".to_string();
    };
    let m = &status.manifest;

    let mut out = String::new();
    out.push_str(&format!(
        "Installed by bmad {} in {}/\n",
        m.installation.version, m.bmad_folder
    ));
    out.push_str(&format!(
        "Installed: {}\n",
        m.installation.install_date.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&format!(
        "Updated:   {}\n",
        m.installation.last_updated.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&format!("User:      {}\n", m.settings.user_name));
    out.push_str(&format!("Output:    {}\n", m.settings.output_folder));
    out.push_str(&format!("Agents:    {}\n", m.agent_count()));

    out.push_str("\n--- Modules ---\n");
    for module in &m.modules {
        out.push_str(&format!("  {} {} [{}]\n", module.name, module.version, module.source));
    }

    out.push_str("\n--- IDEs ---\n");
    if m.ides.is_empty() {
        out.push_str("  (none)\n");
    }
    for ide in &m.ides {
        let count = m.generated.iter().filter(|f| &f.ide == ide).count();
        out.push_str(&format!("  {ide}: {count} command file(s)\n"));
    }

    if !status.customized_agents.is_empty() {
        out.push_str(&format!(
            "\nCustomized agents: {}\n",
            status.customized_agents.join(", ")
        ));
    }

    if status.available_updates.is_empty() {
        out.push_str("\nAll modules are up to date.");
    } else {
        out.push_str("\n--- Updates available ---\n");
        for u in &status.available_updates {
            out.push_str(&format!("  {} {} -> {}\n", u.module, u.installed, u.available));
        }
        out.push_str("Run `bmad update` or `bmad quick-update` to apply.");
    }
    out
}

fn push_warnings(out: &mut String, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    out.push_str(&format!("\n\nWarnings ({}):", warnings.len()));
    for w in warnings {
        out.push_str(&format!("\n  - {w}"));
    }
}
