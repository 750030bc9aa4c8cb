use imgstore_build::Descriptor;
use imgstore_core::config::CONFIG_FILE;
use imgstore_core::{BuildContext, ImgstoreConfig};
use imgstore_docker::{CheckResult, DockerClient};
use std::path::Path;

pub async fn doctor() -> anyhow::Result<()> {
    let project_dir = Path::new(".");
    let client = DockerClient::new();
    let mut report = client.doctor().await;

    // Config file check
    let config = match ImgstoreConfig::load(project_dir) {
        Ok(config) => {
            let detail = if project_dir.join(CONFIG_FILE).exists() {
                "Found"
            } else {
                "Not found (using defaults)"
            };
            report.push(CONFIG_FILE, CheckResult::ok(detail));
            Some(config)
        }
        Err(e) => {
            report.push(CONFIG_FILE, CheckResult::fail(&e.to_string()));
            None
        }
    };

    // Manifest and entry binary
    let package = config
        .as_ref()
        .and_then(|config| config.project.package.as_deref());
    let context = match BuildContext::open_package(project_dir, package) {
        Ok(context) => {
            report.push(
                "Cargo.toml",
                CheckResult::ok(&format!("package {} {}", context.name, context.version)),
            );
            report.push("Entry binary", CheckResult::ok(&context.binary_name));
            report.push(
                "Cargo.lock",
                if context.has_lockfile {
                    CheckResult::ok("Found (--locked)")
                } else {
                    CheckResult::ok("Not found (dependencies resolved at build time)")
                },
            );
            Some(context)
        }
        Err(e) => {
            report.push("Cargo.toml", CheckResult::fail(&e.to_string()));
            None
        }
    };

    // Descriptor contract
    if let (Some(config), Some(context)) = (&config, &context) {
        let result = match super::resolve_dockerfile(project_dir, config, context) {
            Ok((dockerfile, _)) => match Descriptor::parse(&dockerfile) {
                Ok(descriptor) => {
                    let violations = descriptor.validate();
                    match violations.first() {
                        None => CheckResult::ok("Satisfied"),
                        Some(first) => CheckResult::fail(&format!(
                            "{} violation(s), first: {first}",
                            violations.len()
                        )),
                    }
                }
                Err(e) => CheckResult::fail(&e.to_string()),
            },
            Err(e) => CheckResult::fail(&e.to_string()),
        };
        report.push("Launch contract", result);
    }

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed — see above for details");
    }

    Ok(())
}
