// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rebuilding Munki catalogs after an import.

use {
    log::{debug, info},
    processor_common::{
        tool::ToolCommand, Environment, OutputSpec, Processor, ProcessorError, Settings,
        VariableSpec,
    },
    std::path::{Path, PathBuf},
};

const STEP: &str = "make catalogs";

/// File the packaging host records the current run's results in.
pub const RESULTS_FILE: &str = "autopkg_results.plist";

/// Host-wide cache directory, as opposed to the per-recipe one.
fn results_dir(env: &Environment) -> PathBuf {
    env.get_str("CACHE_DIR")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("CACHE_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| Settings::default().cache_dir)
}

/// Load run results, treating an absent file as an empty run.
pub fn load_run_results(path: &Path) -> Result<plist::Value, ProcessorError> {
    if !path.exists() {
        debug!("{}: {} does not exist", STEP, path.display());
        return Ok(plist::Value::Array(vec![]));
    }

    plist::Value::from_file(path)
        .map_err(|e| ProcessorError::parse(STEP, path.display(), e))
}

/// Whether any recipe in the run imported something into the repository.
///
/// Results are an array (one entry per recipe) of arrays (one entry per
/// processor) of dictionaries carrying `Processor` and `Output`.
pub fn something_imported(results: &plist::Value) -> bool {
    results
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|recipe| recipe.as_array())
        .flatten()
        .filter_map(|item| item.as_dictionary())
        .filter(|item| {
            item.get("Processor").and_then(|v| v.as_string()) == Some("MunkiImporter")
        })
        .any(|item| {
            item.get("Output")
                .and_then(|v| v.as_dictionary())
                .and_then(|output| output.get("pkginfo_repo_path"))
                .and_then(|v| v.as_string())
                .map(|s| !s.is_empty())
                .unwrap_or(false)
        })
}

/// Build the `makecatalogs` invocation for a repository.
///
/// Repositories given as absolute paths are passed positionally; anything
/// else is treated as a repository URL.
pub fn makecatalogs_command(settings: &Settings, repo: &str, plugin: Option<&str>) -> ToolCommand {
    let mut command = ToolCommand::new(STEP, &settings.tools.makecatalogs)
        .operation(format!("rebuilding catalogs in {}", repo))
        .timeout(settings.tool_timeout);

    command = if repo.starts_with('/') {
        command.arg(repo)
    } else {
        command.args(["--repo-url", repo])
    };

    if let Some(plugin) = plugin {
        command = command.args(["--plugin", plugin]);
    }

    command
}

pub struct MakeCatalogsProcessor;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required("MUNKI_REPO", "Munki repo URL."),
    VariableSpec::optional(
        "MUNKI_REPO_PLUGIN",
        "Name of a Munki repo plugin. Defaults to FileRepo",
    ),
    VariableSpec::optional(
        "force_rebuild",
        "If not false or empty or undefined, force a makecatalogs run.",
    ),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new(
        "makecatalogs_resultcode",
        "Result code from the makecatalogs operation.",
    ),
    OutputSpec::new(
        "makecatalogs_stderr",
        "Error output (if any) from makecatalogs.",
    ),
];

impl Processor for MakeCatalogsProcessor {
    fn name(&self) -> &'static str {
        "MakeCatalogsProcessor"
    }

    fn description(&self) -> &'static str {
        "Runs makecatalogs on a munki repo."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn main(&self, env: &mut Environment) -> Result<(), ProcessorError> {
        let results = load_run_results(&results_dir(env).join(RESULTS_FILE))?;

        if !something_imported(&results) && !env.is_truthy("force_rebuild") {
            info!("No need to rebuild catalogs.");
            env.set("makecatalogs_resultcode", 0i64);
            env.set("makecatalogs_stderr", "");

            return Ok(());
        }

        let settings = Settings::from_environment(env)?;
        let repo = env.require_str("MUNKI_REPO")?;
        let plugin = env.get_str("MUNKI_REPO_PLUGIN").filter(|s| !s.is_empty());

        let output = makecatalogs_command(&settings, repo, plugin).output_unchecked()?;
        env.set("makecatalogs_resultcode", i64::from(output.code));
        env.set("makecatalogs_stderr", output.stderr.clone());

        if !output.success() {
            return Err(ProcessorError::ExternalToolFailure {
                step: STEP,
                operation: "makecatalogs".into(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!("Munki catalogs rebuilt!");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        indoc::indoc,
        processor_common::{testutil::write_fake_tool, ErrorKind},
    };

    const IMPORTED: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
        <plist version="1.0">
        <array>
            <array>
                <dict>
                    <key>Processor</key>
                    <string>URLDownloader</string>
                    <key>Output</key>
                    <dict/>
                </dict>
                <dict>
                    <key>Processor</key>
                    <string>MunkiImporter</string>
                    <key>Output</key>
                    <dict>
                        <key>pkginfo_repo_path</key>
                        <string>/repo/pkgsinfo/Firefox-118.0.plist</string>
                    </dict>
                </dict>
            </array>
        </array>
        </plist>
    "#};

    const NOTHING_IMPORTED: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <plist version="1.0">
        <array>
            <array>
                <dict>
                    <key>Processor</key>
                    <string>MunkiImporter</string>
                    <key>Output</key>
                    <dict>
                        <key>pkginfo_repo_path</key>
                        <string></string>
                    </dict>
                </dict>
            </array>
        </array>
        </plist>
    "#};

    fn parse(data: &str) -> plist::Value {
        plist::Value::from_reader_xml(data.as_bytes()).unwrap()
    }

    fn env_for(cache: &Path, makecatalogs: &Path, repo: &str) -> Environment {
        let mut env = Environment::new();
        env.set("CACHE_DIR", cache.to_string_lossy().into_owned());
        env.set("MAKECATALOGS_PATH", makecatalogs.to_string_lossy().into_owned());
        env.set("MUNKI_REPO", repo);
        env
    }

    #[test]
    fn detects_imports() {
        assert!(something_imported(&parse(IMPORTED)));
        assert!(!something_imported(&parse(NOTHING_IMPORTED)));
        assert!(!something_imported(&plist::Value::Array(vec![])));
    }

    #[test]
    fn skips_when_nothing_imported() -> Result<(), Box<dyn std::error::Error>> {
        let td = tempfile::tempdir()?;
        let marker = td.path().join("ran");
        let tool = write_fake_tool(
            td.path(),
            "makecatalogs",
            &format!("touch '{}'", marker.display()),
        )?;

        let mut env = env_for(td.path(), &tool, "/repo");
        processor_common::execute(&MakeCatalogsProcessor, &mut env)?;

        assert!(!marker.exists());
        assert_eq!(
            env.get("makecatalogs_resultcode"),
            Some(&plist::Value::from(0i64))
        );
        assert_eq!(env.get_str("makecatalogs_stderr"), Some(""));

        Ok(())
    }

    #[test]
    fn runs_after_import() -> Result<(), Box<dyn std::error::Error>> {
        let td = tempfile::tempdir()?;
        std::fs::write(td.path().join(RESULTS_FILE), IMPORTED)?;
        let log = td.path().join("args");
        let tool = write_fake_tool(
            td.path(),
            "makecatalogs",
            &format!("echo \"$@\" > '{}'", log.display()),
        )?;

        let mut env = env_for(td.path(), &tool, "/Users/Shared/munki_repo");
        processor_common::execute(&MakeCatalogsProcessor, &mut env)?;

        assert_eq!(
            std::fs::read_to_string(&log)?.trim(),
            "/Users/Shared/munki_repo"
        );

        Ok(())
    }

    #[test]
    fn forced_with_url_and_plugin() -> Result<(), Box<dyn std::error::Error>> {
        let td = tempfile::tempdir()?;
        let log = td.path().join("args");
        let tool = write_fake_tool(
            td.path(),
            "makecatalogs",
            &format!("echo \"$@\" > '{}'", log.display()),
        )?;

        let mut env = env_for(td.path(), &tool, "s3://munki-bucket");
        env.set("MUNKI_REPO_PLUGIN", "S3Repo");
        env.set("force_rebuild", true);
        processor_common::execute(&MakeCatalogsProcessor, &mut env)?;

        assert_eq!(
            std::fs::read_to_string(&log)?.trim(),
            "--repo-url s3://munki-bucket --plugin S3Repo"
        );

        Ok(())
    }

    #[test]
    fn failure_records_outputs() -> Result<(), Box<dyn std::error::Error>> {
        let td = tempfile::tempdir()?;
        let tool = write_fake_tool(
            td.path(),
            "makecatalogs",
            "echo 'pkgsinfo directory missing' >&2\nexit 2",
        )?;

        let mut env = env_for(td.path(), &tool, "/repo");
        env.set("force_rebuild", "yes");
        let err = processor_common::execute(&MakeCatalogsProcessor, &mut env).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert_eq!(
            env.get("makecatalogs_resultcode"),
            Some(&plist::Value::from(2i64))
        );
        assert!(env
            .get_str("makecatalogs_stderr")
            .unwrap_or_default()
            .contains("pkgsinfo directory missing"));

        Ok(())
    }

    #[test]
    fn malformed_results() -> Result<(), Box<dyn std::error::Error>> {
        let td = tempfile::tempdir()?;
        let path = td.path().join(RESULTS_FILE);
        std::fs::write(&path, b"<plist><array>")?;

        assert_eq!(
            load_run_results(&path).unwrap_err().kind(),
            ErrorKind::ParseFailure
        );

        Ok(())
    }
}
