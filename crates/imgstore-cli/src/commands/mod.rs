mod build;
mod doctor;
mod eject;
mod init;
mod serve;

use imgstore_build::DescriptorGenerator;
use imgstore_build::eject as eject_mod;
use imgstore_core::{BuildContext, ImgstoreConfig};
use std::path::Path;

pub use build::build;
pub use doctor::doctor;
pub use eject::{dockerfile, eject};
pub use init::init_project;
pub use serve::{ServeArgs, serve};

/// Open the build context in `project_dir`. `package` (a flag) wins over
/// `[project] package`.
pub(crate) fn open_context(
    project_dir: &Path,
    config: &ImgstoreConfig,
    package: Option<&str>,
) -> anyhow::Result<BuildContext> {
    let package = package.or(config.project.package.as_deref());
    Ok(BuildContext::open_package(project_dir, package)?)
}

/// The Dockerfile a build of `project_dir` uses: the ejected one if present,
/// otherwise a freshly generated one. The flag is `true` for ejected files.
pub(crate) fn resolve_dockerfile(
    project_dir: &Path,
    config: &ImgstoreConfig,
    context: &BuildContext,
) -> anyhow::Result<(String, bool)> {
    if eject_mod::is_ejected(project_dir) {
        return Ok((eject_mod::load_ejected_dockerfile(project_dir)?, true));
    }
    let generator = DescriptorGenerator::new(&config.build, &config.serve, context);
    Ok((generator.render(), false))
}
