//! The generation exchange against a real worker subprocess.

use channel::ChannelError;
use services_generator::{
    GeneratorCmd, ModelState, ScoreArtifact, EXIT, GENERATE, LOAD, QUERY_STATE,
};
use std::process::Command;
use worker::ProcessWorker;

fn spawn_worker() -> ProcessWorker<GeneratorCmd> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_counterpointd"));
    command.arg("--generator-worker");
    let mut worker = ProcessWorker::new(command);
    worker.start().unwrap();
    worker
}

#[test]
fn test_process_worker_serves_the_generation_exchange() {
    let model_dir = tempfile::tempdir().unwrap();
    let mut worker = spawn_worker();
    let actor = worker.actor().unwrap();

    let reply = actor
        .invoke_failing(LOAD, GeneratorCmd::Load(model_dir.path().to_path_buf()))
        .unwrap();
    assert_eq!(reply, GeneratorCmd::LoadDone);

    let reply = actor
        .invoke_failing(QUERY_STATE, GeneratorCmd::StateQuery)
        .unwrap();
    assert_eq!(reply, GeneratorCmd::StateIs(ModelState::Loaded));

    let reply = actor
        .invoke_failing(
            GENERATE,
            GeneratorCmd::Generate {
                artifact: ScoreArtifact::new("menuet", vec![7, 7, 7]),
                batch: 2,
            },
        )
        .unwrap();
    let variations = match reply {
        GeneratorCmd::Generated(variations) => variations,
        other => panic!("unexpected reply: {:?}", other),
    };
    assert_eq!(variations.len(), 2);
    assert_eq!(variations[0].name, "menuet-v1");
    assert_eq!(variations[0].data, vec![7, 7, 7, 1]);
    assert_eq!(variations[1].name, "menuet-v2");
    assert_eq!(variations[1].data, vec![7, 7, 7, 2]);

    worker.shutdown(EXIT, GeneratorCmd::Exit).unwrap();
    assert!(worker.state().is_terminal());
}

#[test]
fn test_failure_crosses_the_process_boundary() {
    let mut worker = spawn_worker();
    let actor = worker.actor().unwrap();

    let err = actor
        .invoke_failing(
            GENERATE,
            GeneratorCmd::Generate {
                artifact: ScoreArtifact::new("menuet", vec![7]),
                batch: 1,
            },
        )
        .unwrap_err();
    match err {
        ChannelError::Command(failure) => {
            assert_eq!(failure.to_string(), "command Cmd(4): no model loaded");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    worker.shutdown(EXIT, GeneratorCmd::Exit).unwrap();
}
