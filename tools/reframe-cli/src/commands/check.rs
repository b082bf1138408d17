//! Check external tools and configuration.

use reframe_common::config::{config_file_path, AppConfig};
use reframe_render::ffmpeg::FfmpegTools;

pub fn run(app: &AppConfig) -> anyhow::Result<()> {
    println!("Reframe System Check");
    println!("{}", "=".repeat(50));

    let tools = FfmpegTools::from_defaults(&app.render);
    let ffmpeg_ok = tools.ffmpeg_available();
    let ffprobe_ok = tools.ffprobe_available();

    if ffmpeg_ok {
        println!("[OK] ffmpeg: {}", tools.ffmpeg);
    } else {
        println!("[WARN] ffmpeg not found: {}", tools.ffmpeg);
    }
    if ffprobe_ok {
        println!("[OK] ffprobe: {}", tools.ffprobe);
    } else {
        println!("[WARN] ffprobe not found: {}", tools.ffprobe);
    }
    println!(
        "     Encoder: {} (preset {}, crf {})",
        tools.video_codec, tools.preset, tools.crf
    );

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[--] Config: {} (using defaults)", path.display());
    }
    if let Some(framing) = &app.framing_config {
        if framing.exists() {
            println!("[OK] Framing config: {}", framing.display());
        } else {
            println!("[WARN] Framing config missing: {}", framing.display());
        }
    }

    println!();
    if ffmpeg_ok && ffprobe_ok {
        println!("Video input and output are available.");
    } else {
        println!("Video files need ffmpeg/ffprobe. Image directories still work.");
    }

    Ok(())
}
