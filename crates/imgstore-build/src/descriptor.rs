use std::fmt;

use imgstore_core::{BuildConfig, BuildContext, ServeConfig};

/// Interface the start command binds inside the container.
pub const CONTAINER_HOST: &str = "0.0.0.0";

/// A single Dockerfile instruction (everything except `FROM`, which opens a [`Stage`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Workdir(String),
    Copy {
        from: Option<String>,
        sources: Vec<String>,
        dest: String,
    },
    Run(String),
    Env {
        key: String,
        value: String,
    },
    Expose(u16),
    /// Exec-form start command
    Cmd(Vec<String>),
    /// Anything the descriptor does not model, kept verbatim
    Other {
        keyword: String,
        args: String,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workdir(dir) => write!(f, "WORKDIR {dir}"),
            Self::Copy {
                from,
                sources,
                dest,
            } => {
                f.write_str("COPY ")?;
                if let Some(stage) = from {
                    write!(f, "--from={stage} ")?;
                }
                write!(f, "{} {dest}", sources.join(" "))
            }
            Self::Run(command) => write!(f, "RUN {command}"),
            Self::Env { key, value } => {
                if value.is_empty() || value.contains(char::is_whitespace) || value.contains('"') {
                    write!(f, "ENV {key}={}", quote(value))
                } else {
                    write!(f, "ENV {key}={value}")
                }
            }
            Self::Expose(port) => write!(f, "EXPOSE {port}"),
            Self::Cmd(args) => {
                let quoted: Vec<String> = args.iter().map(|a| quote(a)).collect();
                write!(f, "CMD [{}]", quoted.join(", "))
            }
            Self::Other { keyword, args } => write!(f, "{keyword} {args}"),
        }
    }
}

/// One `FROM` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Banner comment rendered above `FROM`
    pub title: Option<String>,
    pub image: String,
    pub alias: Option<String>,
    pub instructions: Vec<Instruction>,
}

impl Stage {
    fn new(title: &str, image: &str, alias: Option<&str>) -> Self {
        Self {
            title: Some(title.to_owned()),
            image: image.to_owned(),
            alias: alias.map(str::to_owned),
            instructions: Vec::new(),
        }
    }

    fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }
}

/// The container build-and-launch descriptor: an ordered list of stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    pub stages: Vec<Stage>,
}

impl Descriptor {
    /// Render as Dockerfile text.
    pub fn render(&self) -> String {
        let blocks: Vec<String> = self
            .stages
            .iter()
            .map(|stage| {
                let mut block = String::new();
                if let Some(title) = &stage.title {
                    block.push_str(&format!("# === {title} ===\n"));
                }
                block.push_str(&format!("FROM {}", stage.image));
                if let Some(alias) = &stage.alias {
                    block.push_str(&format!(" AS {alias}"));
                }
                block.push('\n');
                for instruction in &stage.instructions {
                    block.push_str(&instruction.to_string());
                    block.push('\n');
                }
                block
            })
            .collect();
        blocks.join("\n")
    }

    /// The final stage, i.e. the image that runs.
    pub fn runtime_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// The start command of the runtime stage (last `CMD` wins).
    pub fn start_command(&self) -> Option<&[String]> {
        self.runtime_stage()?
            .instructions
            .iter()
            .rev()
            .find_map(|i| match i {
                Instruction::Cmd(args) => Some(args.as_slice()),
                _ => None,
            })
    }

    /// Ports declared with `EXPOSE` in the runtime stage.
    pub fn declared_ports(&self) -> Vec<u16> {
        self.runtime_stage()
            .map(|stage| {
                stage
                    .instructions
                    .iter()
                    .filter_map(|i| match i {
                        Instruction::Expose(port) => Some(*port),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Value following `flag` in a start command (`--port 8000` or `--port=8000`).
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let prefix = format!("{flag}=");
    args.iter().enumerate().find_map(|(idx, arg)| {
        if arg == flag {
            args.get(idx + 1).map(String::as_str)
        } else {
            arg.strip_prefix(&prefix)
        }
    })
}

/// Generates the multi-stage build descriptor.
///
/// Dependency installation is isolated from the application code: cargo-chef
/// reduces the manifests to `recipe.json`, the dependency stage only sees that
/// recipe, and `COPY . .` happens afterwards. An edit to `src/` therefore
/// reuses the cooked dependency layer.
pub struct DescriptorGenerator<'a> {
    build: &'a BuildConfig,
    serve: &'a ServeConfig,
    context: &'a BuildContext,
}

impl<'a> DescriptorGenerator<'a> {
    pub fn new(build: &'a BuildConfig, serve: &'a ServeConfig, context: &'a BuildContext) -> Self {
        Self {
            build,
            serve,
            context,
        }
    }

    pub fn generate(&self) -> Descriptor {
        let workdir = self.build.workdir.as_str();
        let binary = self.context.binary_name.as_str();
        let locked = if self.context.has_lockfile {
            " --locked"
        } else {
            ""
        };
        let apt = self.apt_install();

        let mut chef = Stage::new("Base: cargo-chef installed once", &self.build.base_image, Some("chef"));
        chef.push(Instruction::Run(format!(
            "cargo install cargo-chef --version {} --locked",
            self.build.cargo_chef_version
        )))
        .push(Instruction::Workdir(workdir.to_owned()));

        let mut planner = Stage::new("Stage 1: Planner", "chef", Some("planner"));
        planner
            .push(copy_context())
            .push(Instruction::Run(
                "cargo chef prepare --recipe-path recipe.json".to_owned(),
            ));

        let mut cacher = Stage::new("Stage 2: Dependencies", "chef", Some("cacher"));
        if let Some(run) = &apt {
            cacher.push(run.clone());
        }
        cacher
            .push(Instruction::Copy {
                from: Some("planner".to_owned()),
                sources: vec![format!("{workdir}/recipe.json")],
                dest: "recipe.json".to_owned(),
            })
            .push(Instruction::Run(format!(
                "cargo chef cook --release{locked} --recipe-path recipe.json"
            )));

        let mut builder = Stage::new("Stage 3: Builder", "chef", Some("builder"));
        if let Some(run) = &apt {
            builder.push(run.clone());
        }
        builder
            .push(Instruction::Copy {
                from: Some("cacher".to_owned()),
                sources: vec![format!("{workdir}/target")],
                dest: "target".to_owned(),
            })
            .push(Instruction::Copy {
                from: Some("cacher".to_owned()),
                sources: vec!["/usr/local/cargo".to_owned()],
                dest: "/usr/local/cargo".to_owned(),
            })
            .push(copy_context())
            .push(Instruction::Run(format!(
                "cargo build --release{locked} -p {package} --bin {binary}",
                package = self.context.name
            )));

        let mut runtime = Stage::new("Stage 4: Runtime", &self.build.runtime_image, None);
        runtime.push(Instruction::Workdir(workdir.to_owned()));

        let mut env: Vec<(&String, &String)> = self.build.env.iter().collect();
        env.sort();
        for (key, value) in env {
            runtime.push(Instruction::Env {
                key: key.clone(),
                value: value.clone(),
            });
        }

        runtime.push(Instruction::Copy {
            from: Some("builder".to_owned()),
            sources: vec![format!("{workdir}/target/release/{binary}")],
            dest: format!("/usr/local/bin/{binary}"),
        });

        match &self.build.include {
            None => {
                runtime.push(copy_context());
            }
            Some(paths) => {
                for path in paths {
                    runtime.push(Instruction::Copy {
                        from: None,
                        sources: vec![path.clone()],
                        dest: format!("./{path}"),
                    });
                }
            }
        }

        let port = self.serve.port.to_string();
        runtime
            .push(Instruction::Run(format!("mkdir -p {}", self.serve.images_dir)))
            .push(Instruction::Expose(self.serve.port))
            .push(Instruction::Cmd(vec![
                binary.to_owned(),
                "serve".to_owned(),
                "--app".to_owned(),
                self.serve.app.clone(),
                "--host".to_owned(),
                CONTAINER_HOST.to_owned(),
                "--port".to_owned(),
                port,
                "--images-dir".to_owned(),
                self.serve.images_dir.clone(),
            ]));

        Descriptor {
            stages: vec![chef, planner, cacher, builder, runtime],
        }
    }

    pub fn render(&self) -> String {
        self.generate().render()
    }

    fn apt_install(&self) -> Option<Instruction> {
        if self.build.extra_packages.is_empty() {
            return None;
        }
        Some(Instruction::Run(format!(
            "apt-get update && apt-get install -y --no-install-recommends {} && rm -rf /var/lib/apt/lists/*",
            self.build.extra_packages.join(" ")
        )))
    }
}

fn copy_context() -> Instruction {
    Instruction::Copy {
        from: None,
        sources: vec![".".to_owned()],
        dest: ".".to_owned(),
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
