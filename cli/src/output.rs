//! Turning rendered elements into terminal output and files.

use std::fs;
use std::path::{Component, Path};

use agri_core::{Image, ImageData};
use anyhow::{anyhow, Context, Result};
use tracing::warn;

/// Status markup uses only `<br>` and `<b>`.
pub fn terminal_text(content: &str) -> String {
    content
        .replace("<br>", "\n")
        .replace("<b>", "")
        .replace("</b>", "")
}

/// Decode a `data:image/png;base64,` URI and write the PNG to `path`.
pub fn save_data_uri(src: &str, path: &Path) -> Result<usize> {
    let image = ImageData::from_data_uri(src).ok_or_else(|| anyhow!("not a PNG data URI"))?;
    let bytes = image.decode()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(bytes.len())
}

/// `name` if it can be used as a file stem inside the output directory.
/// Plot names come from the server, so anything with a separator, a `..`
/// or a root is refused.
fn plain_stem(name: &str) -> Option<&str> {
    let path = Path::new(name);
    let single = path.file_name().and_then(|n| n.to_str()) == Some(name);
    let mut components = path.components();
    let normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    (single && normal && !name.contains(['/', '\\'])).then_some(name)
}

/// Write each plot as `<dir>/<alt>.png`. A missing or unsafe name falls
/// back to the plot's position.
pub fn save_plots(images: &[Image], dir: &Path) -> Result<()> {
    for (index, image) in images.iter().enumerate() {
        let stem = match plain_stem(&image.alt) {
            Some(name) => name.to_string(),
            None => {
                if !image.alt.is_empty() {
                    warn!(name = %image.alt, "plot name is not a plain file name");
                }
                format!("plot-{:02}", index + 1)
            }
        };
        let path = dir.join(format!("{stem}.png"));
        let written = save_data_uri(&image.src, &path)?;
        println!("saved {} ({written} bytes)", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_status_markup() {
        assert_eq!(
            terminal_text("Model trained!<br>R² Score: 0.8765"),
            "Model trained!\nR² Score: 0.8765"
        );
        assert_eq!(
            terminal_text("Predicted Yield: <b>1234.57</b> kg/ha"),
            "Predicted Yield: 1234.57 kg/ha"
        );
    }

    fn plot(alt: &str) -> Image {
        Image {
            src: format!("data:image/png;base64,{}", mock_server::PLACEHOLDER_PNG),
            alt: alt.to_string(),
            class: "plot-img".to_string(),
        }
    }

    #[test]
    fn saves_plots_by_name() {
        let dir = tempfile::tempdir().unwrap();
        save_plots(&[plot("missing_values"), plot("")], dir.path()).unwrap();

        let named = fs::read(dir.path().join("missing_values.png")).unwrap();
        assert_eq!(&named[1..4], b"PNG");
        assert!(dir.path().join("plot-02.png").exists());
    }

    #[test]
    fn plot_names_cannot_leave_the_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        let absolute = root.path().join("absolute");
        let absolute = absolute.to_str().unwrap();

        save_plots(&[plot("../escaped"), plot(absolute), plot(".."), plot("a/b")], &out).unwrap();

        assert!(!root.path().join("escaped.png").exists());
        assert!(!root.path().join("absolute.png").exists());
        for n in 1..=4 {
            assert!(out.join(format!("plot-{n:02}.png")).exists(), "plot-{n:02}");
        }
        assert_eq!(fs::read_dir(&out).unwrap().count(), 4);
    }

    #[test]
    fn plain_stem_accepts_ordinary_names() {
        assert_eq!(plain_stem("yield_distribution"), Some("yield_distribution"));
        assert_eq!(plain_stem("."), None);
        assert_eq!(plain_stem(""), None);
        assert_eq!(plain_stem("a\\b"), None);
    }

    #[test]
    fn rejects_non_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-written.png");
        assert!(save_data_uri("https://example.com/a.png", &path).is_err());
        assert!(!path.exists());
    }
}
