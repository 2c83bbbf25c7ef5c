//! Stereo buffer layout helpers
//!
//! The engine renders into separate left and right buffers. Audio devices and most
//! file formats want interleaved `LRLR...` frames instead.

use crate::error::{AuralisError, Result};

/// Interleaves `frames` samples of `left` and `right` into `out`.
///
/// # Errors
///
/// Returns `InvalidBuffer` if a channel holds fewer than `frames` samples or `out`
/// holds fewer than `2 * frames`.
pub fn interleave_stereo(left: &[f32], right: &[f32], out: &mut [f32], frames: usize) -> Result<()> {
    check_len("left", left.len(), frames)?;
    check_len("right", right.len(), frames)?;
    check_len("interleaved", out.len(), interleaved_len(frames)?)?;

    for ((frame, l), r) in out.chunks_exact_mut(2).zip(left).zip(right).take(frames) {
        frame[0] = *l;
        frame[1] = *r;
    }
    Ok(())
}

/// Splits `frames` interleaved stereo frames from `input` into `left` and `right`.
///
/// # Errors
///
/// Returns `InvalidBuffer` if `input` holds fewer than `2 * frames` samples or a
/// channel holds fewer than `frames`.
pub fn uninterleave_stereo(
    input: &[f32],
    left: &mut [f32],
    right: &mut [f32],
    frames: usize,
) -> Result<()> {
    check_len("interleaved", input.len(), interleaved_len(frames)?)?;
    check_len("left", left.len(), frames)?;
    check_len("right", right.len(), frames)?;

    for ((frame, l), r) in input
        .chunks_exact(2)
        .zip(left.iter_mut())
        .zip(right.iter_mut())
        .take(frames)
    {
        *l = frame[0];
        *r = frame[1];
    }
    Ok(())
}

fn interleaved_len(frames: usize) -> Result<usize> {
    frames
        .checked_mul(2)
        .ok_or_else(|| AuralisError::InvalidBuffer(format!("{} frames do not fit a buffer", frames)))
}

fn check_len(name: &str, len: usize, needed: usize) -> Result<()> {
    if len < needed {
        return Err(AuralisError::InvalidBuffer(format!(
            "{} buffer holds {} samples, need {}",
            name, len, needed
        )));
    }
    Ok(())
}
