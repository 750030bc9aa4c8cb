//! Launch-contract checks over a [`Descriptor`].
//!
//! The runtime stage must declare exactly the port its start command serves
//! on, bind all interfaces, and create the images directory before starting.
//! The dependency install must see only manifests, never application code.

use std::path::Path;

use crate::descriptor::{CONTAINER_HOST, Descriptor, Instruction, Stage, flag_value};
use crate::parse::ParseError;

/// Images directory assumed when the start command does not pass `--images-dir`.
const DEFAULT_IMAGES_DIR: &str = "images";

/// Files allowed into the dependency layer.
const MANIFEST_FILES: &[&str] = &["Cargo.toml", "Cargo.lock", "recipe.json"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("descriptor has no stages")]
    NoStages,

    #[error("runtime stage has no CMD")]
    MissingCmd,

    #[error("start command does not pass --port")]
    CmdWithoutPort,

    #[error("start command port {0:?} is not a valid port")]
    InvalidCmdPort(String),

    #[error("start command binds {host}, expected 0.0.0.0")]
    HostNotAllInterfaces { host: String },

    #[error("runtime stage declares no port (EXPOSE)")]
    MissingExpose,

    #[error("EXPOSE {declared} does not match start command port {served}")]
    PortMismatch { declared: u16, served: u16 },

    #[error("port {port} appears in {location} but the service listens on {served}")]
    StrayPort {
        port: u16,
        location: String,
        served: u16,
    },

    #[error("images directory {0:?} is not created before CMD")]
    MissingImagesDir(String),

    #[error("no dependency install step (cargo chef cook / cargo fetch)")]
    DependencyInstallMissing,

    #[error("dependency manifest is not copied before the dependency install")]
    ManifestNotCopiedFirst,

    #[error("application source {0:?} is copied before the dependency install")]
    SourceCopiedBeforeInstall(String),
}

impl Descriptor {
    /// Check the launch contract. An empty list means the descriptor is sound.
    pub fn validate(&self) -> Vec<ContractViolation> {
        let Some(runtime) = self.runtime_stage() else {
            return vec![ContractViolation::NoStages];
        };

        let mut violations = Vec::new();
        check_start_command(self, runtime, &mut violations);
        check_dependency_layer(self, &mut violations);
        violations
    }
}

/// Parse Dockerfile text and check it.
pub fn validate_dockerfile(text: &str) -> Result<Vec<ContractViolation>, ParseError> {
    Ok(Descriptor::parse(text)?.validate())
}

fn check_start_command(
    descriptor: &Descriptor,
    runtime: &Stage,
    violations: &mut Vec<ContractViolation>,
) {
    let Some(cmd_index) = runtime
        .instructions
        .iter()
        .rposition(|i| matches!(i, Instruction::Cmd(_)))
    else {
        violations.push(ContractViolation::MissingCmd);
        return;
    };
    let Instruction::Cmd(args) = &runtime.instructions[cmd_index] else {
        return;
    };

    match flag_value(args, "--host") {
        Some(CONTAINER_HOST) => {}
        Some(other) => violations.push(ContractViolation::HostNotAllInterfaces {
            host: other.to_owned(),
        }),
        None => violations.push(ContractViolation::HostNotAllInterfaces {
            host: "(unset)".to_owned(),
        }),
    }

    let images_dir = flag_value(args, "--images-dir").unwrap_or(DEFAULT_IMAGES_DIR);
    let creates_images = runtime.instructions[..cmd_index].iter().any(|i| match i {
        Instruction::Run(command) => creates_dir(command, images_dir),
        _ => false,
    });
    if !creates_images {
        violations.push(ContractViolation::MissingImagesDir(images_dir.to_owned()));
    }

    let served = match flag_value(args, "--port") {
        None => {
            violations.push(ContractViolation::CmdWithoutPort);
            return;
        }
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => {
                violations.push(ContractViolation::InvalidCmdPort(raw.to_owned()));
                return;
            }
        },
    };

    let declared = descriptor.declared_ports();
    if declared.is_empty() {
        violations.push(ContractViolation::MissingExpose);
    }
    for port in declared.into_iter().filter(|p| *p != served) {
        violations.push(ContractViolation::PortMismatch {
            declared: port,
            served,
        });
    }

    let last = descriptor.stages.len() - 1;
    for (idx, stage) in descriptor.stages.iter().enumerate() {
        let name = stage_name(stage, idx);
        for instruction in &stage.instructions {
            let (location, mut ports) = match instruction {
                Instruction::Expose(port) if idx != last => {
                    (format!("EXPOSE in stage {name}"), vec![*port])
                }
                Instruction::Env { key, value } => {
                    let mut ports = port_mentions(value);
                    if key.to_ascii_uppercase().ends_with("PORT") {
                        ports.extend(leading_port(value));
                    }
                    (format!("ENV {key}"), ports)
                }
                Instruction::Run(command) => {
                    (format!("RUN in stage {name}"), port_mentions(command))
                }
                Instruction::Cmd(args) => (
                    format!("CMD in stage {name}"),
                    port_mentions(&args.join(" ")),
                ),
                Instruction::Other { keyword, args } => {
                    (format!("{keyword} in stage {name}"), port_mentions(args))
                }
                _ => continue,
            };
            ports.sort_unstable();
            ports.dedup();
            for port in ports.into_iter().filter(|p| *p != served) {
                violations.push(ContractViolation::StrayPort {
                    port,
                    location: location.clone(),
                    served,
                });
            }
        }
    }
}

/// Ports a command line mentions: `host:N` (socat's `TCP-LISTEN:N` included),
/// `--port N`, `--port=N` and `-p N`.
fn port_mentions(text: &str) -> Vec<u16> {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, '"' | '\'' | '[' | ']' | ',' | ';')))
        .collect();

    let mut ports = Vec::new();
    for (idx, word) in words.iter().enumerate() {
        if matches!(*word, "--port" | "-p") {
            ports.extend(words.get(idx + 1).and_then(|next| leading_port(next)));
        } else if let Some(value) = word.strip_prefix("--port=") {
            ports.extend(leading_port(value));
        }
        ports.extend(
            word.match_indices(':')
                .filter_map(|(pos, _)| leading_port(&word[pos + 1..])),
        );
    }
    ports
}

/// A port number at the start of `text`, ended by the text or a separator.
/// Version strings (`22.04`, `20-alpine`) and words (`8000abc`) do not count.
fn leading_port(text: &str) -> Option<u16> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    if text[end..].starts_with(|c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
        return None;
    }
    match text[..end].parse::<u16>() {
        Ok(port) if port != 0 => Some(port),
        _ => None,
    }
}

fn check_dependency_layer(descriptor: &Descriptor, violations: &mut Vec<ContractViolation>) {
    let install = descriptor
        .stages
        .iter()
        .enumerate()
        .find_map(|(stage_idx, stage)| {
            stage
                .instructions
                .iter()
                .position(|i| matches!(i, Instruction::Run(cmd) if is_dependency_install(cmd)))
                .map(|pos| (stage_idx, pos))
        });

    let Some((stage_idx, pos)) = install else {
        violations.push(ContractViolation::DependencyInstallMissing);
        return;
    };

    // Everything the install step can see: its ancestors, then its own prefix.
    let mut visible: Vec<&Instruction> = Vec::new();
    for ancestor in ancestors(descriptor, stage_idx).into_iter().rev() {
        visible.extend(descriptor.stages[ancestor].instructions.iter());
    }
    visible.extend(descriptor.stages[stage_idx].instructions[..pos].iter());

    let mut manifest_copied = false;
    for instruction in visible {
        let Instruction::Copy { from, sources, .. } = instruction else {
            continue;
        };
        for source in sources {
            if is_manifest(source) {
                manifest_copied = true;
            } else if from.is_none() {
                violations.push(ContractViolation::SourceCopiedBeforeInstall(source.clone()));
                return;
            }
        }
    }

    if !manifest_copied {
        violations.push(ContractViolation::ManifestNotCopiedFirst);
    }
}

/// Indices of the stages `stage_idx` is built `FROM`, nearest first.
fn ancestors(descriptor: &Descriptor, stage_idx: usize) -> Vec<usize> {
    let mut chain = Vec::new();
    let mut current = stage_idx;
    loop {
        let image = &descriptor.stages[current].image;
        let parent = descriptor.stages[..current]
            .iter()
            .rposition(|s| s.alias.as_deref() == Some(image.as_str()));
        match parent {
            Some(idx) => {
                chain.push(idx);
                current = idx;
            }
            None => return chain,
        }
    }
}

fn is_dependency_install(command: &str) -> bool {
    command.contains("cargo chef cook") || command.contains("cargo fetch")
}

fn is_manifest(source: &str) -> bool {
    Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| MANIFEST_FILES.contains(&n))
}

fn creates_dir(command: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    command.split("&&").any(|part| {
        let words: Vec<&str> = part.split_whitespace().collect();
        words.first() == Some(&"mkdir")
            && words.iter().any(|w| *w == "-p" || *w == "--parents")
            && words[1..].iter().any(|w| {
                let w = w.trim_end_matches('/');
                w == dir || w.ends_with(&format!("/{dir}"))
            })
    })
}

fn stage_name(stage: &Stage, idx: usize) -> String {
    stage.alias.clone().unwrap_or_else(|| idx.to_string())
}
