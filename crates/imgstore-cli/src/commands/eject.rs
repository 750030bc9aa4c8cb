use imgstore_build::DescriptorGenerator;
use imgstore_core::ImgstoreConfig;
use std::path::PathBuf;

pub async fn eject() -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = ImgstoreConfig::load(&project_dir)?;
    let context = super::open_context(&project_dir, &config, None)?;

    let generator = DescriptorGenerator::new(&config.build, &config.serve, &context);
    let dockerfile = generator.render();

    imgstore_build::eject::eject(&project_dir, &dockerfile)?;

    println!("Ejected build config to .imgstore/Dockerfile");
    println!("You can now edit it directly. imgstore build will use this file.");
    Ok(())
}

/// Print the Dockerfile the next build would use.
pub async fn dockerfile() -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = ImgstoreConfig::load(&project_dir)?;
    let context = super::open_context(&project_dir, &config, None)?;

    let (dockerfile, ejected) = super::resolve_dockerfile(&project_dir, &config, &context)?;
    if ejected {
        eprintln!("# using ejected .imgstore/Dockerfile");
    }
    print!("{dockerfile}");
    Ok(())
}
