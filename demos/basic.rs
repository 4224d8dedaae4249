// ABOUTME: Example pipeline binary: a build pipeline feeding a publish pipeline
// ABOUTME: Run with `cargo run --example basic -- run --arg registry=local` or `-- plan`

use std::time::Duration;
use tokio::io::AsyncWriteExt;

use trellis::pipeline::{known, Argument, Event, Pipeline, Step};
use trellis::state::{StateReader, StateWriter};

fn build_pipeline() -> anyhow::Result<Pipeline> {
    let version = Argument::string("version");
    let artifact = Argument::file("artifact");
    let tests_passed = Argument::boolean("tests-passed");

    let mut pipeline = Pipeline::new("build")
        .on(Event::commit().with_filter("branch", "main"))
        .provides([artifact.clone(), tests_passed.clone()]);

    let out = version.clone();
    let compile_version = version.clone();
    let compiled = artifact.clone();
    let passed = tests_passed.clone();

    pipeline.add_steps([
        Step::new("version", move |opts| {
            let out = out.clone();
            async move {
                let build_id = opts.state.get_string(&known::build_id()).await?;
                let short: String = build_id.chars().take(8).collect();
                opts.state
                    .set_string(&out, &format!("0.1.0+{short}"))
                    .await?;
                Ok(())
            }
        })
        .requires([known::build_id()])
        .provides([version.clone()]),
        Step::new("compile", move |mut opts| {
            let version = compile_version.clone();
            let artifact = compiled.clone();
            async move {
                let version = opts.state.get_string(&version).await?;
                let workdir = opts.state.get_string(&known::workdir()).await?;
                let path = std::env::temp_dir().join(format!("app-{version}.bin"));
                tokio::fs::write(&path, format!("built from {workdir}\n")).await?;
                opts.stdout
                    .write_all(format!("compiled {}\n", path.display()).as_bytes())
                    .await?;
                opts.state.set_file(&artifact, &path).await?;
                Ok(())
            }
        })
        .with_image("rust:1.75")
        .requires([version, known::workdir()])
        .provides([artifact.clone()]),
        Step::new("test", move |opts| {
            let passed = passed.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                opts.state.set_bool(&passed, true).await?;
                Ok(())
            }
        })
        .requires([known::source()])
        .provides([tests_passed]),
        Step::new("cache", |opts| async move {
            // sidecar; runs until the pipeline finishes
            opts.cancel.cancelled().await;
            Ok(())
        })
        .background(),
    ])?;

    Ok(pipeline)
}

fn publish_pipeline() -> anyhow::Result<Pipeline> {
    let artifact = Argument::file("artifact");
    let tests_passed = Argument::boolean("tests-passed");
    let registry = Argument::secret("registry");

    let mut pipeline = Pipeline::new("publish").requires([artifact.clone(), tests_passed.clone()]);

    pipeline.add_steps([Step::new("upload", move |mut opts| {
        let artifact = artifact.clone();
        let tests_passed = tests_passed.clone();
        let registry = registry.clone();
        async move {
            if !opts.state.get_bool(&tests_passed).await? {
                anyhow::bail!("refusing to publish an untested artifact");
            }
            let path = opts.state.get_file(&artifact).await?;
            let registry = opts.state.get_string(&registry).await?;
            opts.stdout
                .write_all(format!("uploading {} to {registry}\n", path.display()).as_bytes())
                .await?;
            Ok(())
        }
    })
    .requires([
        Argument::file("artifact"),
        Argument::boolean("tests-passed"),
        Argument::secret("registry"),
    ])])?;

    Ok(pipeline)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trellis::cli::run(vec![build_pipeline()?, publish_pipeline()?]).await
}
