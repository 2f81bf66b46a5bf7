#[cfg_attr(not(windows), allow(dead_code))]
mod geometry;
#[cfg_attr(not(windows), allow(dead_code))]
mod shader_parameters;
#[cfg_attr(not(windows), allow(dead_code))]
mod texture;
#[cfg(windows)]
mod textured_cube;

use d3d12_app_base::logging::init_tracing;
use d3d12_app_base::SampleConfig;
use tracing::info;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let config = SampleConfig::from_env()?;
    init_tracing(config.log_level)?;
    info!("Starting textured_cube with {config}");
    run(&config)
}

#[cfg(windows)]
fn run(config: &SampleConfig) -> eyre::Result<()> {
    d3d12_app_base::window::run_sample::<textured_cube::TexturedCube>(config)
}

#[cfg(not(windows))]
fn run(_config: &SampleConfig) -> eyre::Result<()> {
    eyre::bail!("Direct3D 12 samples only run on Windows")
}
