use crate::error::{AuralisError, Result};
use audionimbus::{AudioSettings, Context, Hrtf, HrtfSettings, Sofa, VolumeNormalization};

/// Loads the HRTF for the Steam Audio renderer.
///
/// `sofa_path` selects a custom SOFA file; `None` uses Steam Audio's built-in HRTF.
pub(crate) fn load_hrtf(
    context: &Context,
    audio_settings: &AudioSettings,
    sofa_path: Option<&str>,
) -> Result<Hrtf> {
    let sofa_information = match sofa_path {
        Some(path) => {
            let data = std::fs::read(path).map_err(|e| {
                AuralisError::Configuration(format!("Failed to read HRTF file {}: {}", path, e))
            })?;
            Some(Sofa::Buffer(data))
        }
        None => None,
    };

    let hrtf = Hrtf::try_new(
        context,
        audio_settings,
        &HrtfSettings {
            volume_normalization: VolumeNormalization::None,
            sofa_information,
            ..Default::default()
        },
    )
    .map_err(|e| AuralisError::Spatialization(format!("Failed to create HRTF: {}", e)))?;

    match sofa_path {
        Some(path) => log::info!("Loaded HRTF from {}", path),
        None => log::info!("Loaded default HRTF"),
    }
    Ok(hrtf)
}
