//! End-to-end workflow execution tests against the library API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use labelflow::handlers::HandlerRegistry;
use labelflow::runner::{run_workflow, RunOptions, StepErrorKind, StepStatus};
use labelflow::workflow::{parse_workflow, ValueMap, WorkflowDefinition};
use labelflow::LabelflowError;

fn yaml(contents: &str) -> WorkflowDefinition {
    parse_workflow(contents, true).unwrap()
}

fn env(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn output(entries: &[(&str, serde_json::Value)]) -> ValueMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn upstream_output_flows_into_dependent_parameters() {
    // A outputs {x: 5}; B receives y resolved from {{ A.x }} and echoes it.
    let workflow = yaml(
        r#"
        name: data_flow
        steps:
          - name: A
            agent: producer
          - name: B
            agent: echo
            parameters:
              y: "{{ A.x }}"
            depends_on: [A]
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("producer", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(output(&[("x", json!(5))]))
    });
    registry.register_agent("echo", |params: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(output(&[("y", params["y"].clone())]))
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    assert!(result.success);
    assert_eq!(result.step("B").unwrap().output["y"], json!(5));
}

#[test]
fn failed_step_skips_dependents_under_default_policy() {
    let workflow = yaml(
        r#"
        name: failure
        steps:
          - name: A
            agent: failing
          - name: B
            agent: noop
            depends_on: [A]
          - name: C
            agent: noop
            depends_on: [B]
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("failing", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        anyhow::bail!("inference endpoint down")
    });
    registry.register_agent("noop", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(ValueMap::new())
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    assert!(!result.success);
    assert_eq!(result.step("A").unwrap().status, StepStatus::Failed);
    assert_eq!(result.step("B").unwrap().status, StepStatus::Skipped);
    assert_eq!(result.step("C").unwrap().status, StepStatus::Skipped);

    let error = result.step("A").unwrap().error.as_ref().unwrap();
    assert_eq!(error.kind, StepErrorKind::HandlerFailed);
    assert!(error.message.contains("inference endpoint down"));
}

#[test]
fn independent_steps_continue_after_a_failure() {
    let workflow = yaml(
        r#"
        name: partial_failure
        steps:
          - name: A
            agent: failing
          - name: C
            agent: counter
        "#,
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let mut registry = HandlerRegistry::new();
    registry.register_agent("failing", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        anyhow::bail!("boom")
    });
    registry.register_agent("counter", move |_: &ValueMap| -> anyhow::Result<ValueMap> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(ValueMap::new())
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    // C has no dependency on A, so it still runs; the run is failed overall.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.step("C").unwrap().status, StepStatus::Success);
    assert!(!result.success);
}

#[test]
fn unresolved_reference_fails_the_step_without_dispatch() {
    let workflow = yaml(
        r#"
        name: bad_reference
        steps:
          - name: A
            agent: counter
            parameters:
              value: "{{ unknown_step.value }}"
          - name: B
            agent: counter
            depends_on: [A]
        "#,
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let mut registry = HandlerRegistry::new();
    registry.register_agent("counter", move |_: &ValueMap| -> anyhow::Result<ValueMap> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(ValueMap::new())
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    assert!(!result.success);
    let a = result.step("A").unwrap();
    assert_eq!(a.status, StepStatus::Failed);
    assert_eq!(a.error.as_ref().unwrap().kind, StepErrorKind::UnresolvedReference);
    assert_eq!(result.step("B").unwrap().status, StepStatus::Skipped);
    // Neither A (failed before dispatch) nor B (skipped) invoked the handler.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn dry_run_invokes_no_handlers_but_validates_references() {
    let workflow = yaml(
        r#"
        name: dry
        steps:
          - name: pull
            agent: counter
            parameters:
              project: "{{ env.PROJECT_ID }}"
          - name: sample
            agent: counter
            parameters:
              source: "{{ pull.annotations }}"
              missing: "{{ env.NOT_SET }}"
            depends_on: [pull]
        "#,
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let mut registry = HandlerRegistry::new();
    registry.register_agent("counter", move |_: &ValueMap| -> anyhow::Result<ValueMap> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(ValueMap::new())
    });

    let options = RunOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = run_workflow(
        &workflow,
        &env(&[("PROJECT_ID", "proj-1")]),
        &registry,
        &options,
    )
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // pull resolves; sample fails on the unset env value even in dry-run.
    assert_eq!(result.step("pull").unwrap().status, StepStatus::Success);
    let sample = result.step("sample").unwrap();
    assert_eq!(sample.status, StepStatus::Failed);
    assert_eq!(
        sample.error.as_ref().unwrap().kind,
        StepErrorKind::UnresolvedReference
    );
    assert!(!result.success);
}

#[test]
fn dry_run_of_resolvable_workflow_succeeds() {
    let workflow = yaml(
        r#"
        name: dry_ok
        parameters:
          batch_size: 50
        steps:
          - name: pull
            agent: counter
            parameters:
              count: "{{ batch_size }}"
          - name: sample
            agent: counter
            parameters:
              source: "{{ pull.annotations.items }}"
            depends_on: [pull]
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("counter", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        anyhow::bail!("handlers must not run in dry-run")
    });

    let options = RunOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = run_workflow(&workflow, &HashMap::new(), &registry, &options).unwrap();

    assert!(result.success);
    // Dry-run records synthetic outputs.
    assert_eq!(result.step("pull").unwrap().output["dry_run"], json!(true));
}

#[test]
fn environment_and_globals_reach_step_parameters() {
    let workflow = yaml(
        r#"
        name: context
        parameters:
          format: coco_json
        steps:
          - name: push
            agent: echo
            parameters:
              project: "{{ env.PROJECT_ID }}"
              format: "{{ format }}"
              label: "export-{{ env.PROJECT_ID }}"
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("echo", |params: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(params.clone())
    });

    let result = run_workflow(
        &workflow,
        &env(&[("PROJECT_ID", "proj-7")]),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    let output = &result.step("push").unwrap().output;
    assert_eq!(output["project"], json!("proj-7"));
    assert_eq!(output["format"], json!("coco_json"));
    assert_eq!(output["label"], json!("export-proj-7"));
}

#[test]
fn literal_parameters_pass_through_structurally_unchanged() {
    let workflow = yaml(
        r#"
        name: literals
        steps:
          - name: A
            agent: echo
            parameters:
              nested:
                count: 3
                tags: [cat, dog]
                flag: true
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("echo", |params: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(params.clone())
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    assert_eq!(
        result.step("A").unwrap().output["nested"],
        json!({"count": 3, "tags": ["cat", "dog"], "flag": true})
    );
}

#[test]
fn cycle_is_rejected_before_any_step_runs() {
    let workflow = yaml(
        r#"
        name: cyclic
        steps:
          - name: A
            agent: counter
            depends_on: [B]
          - name: B
            agent: counter
            depends_on: [A]
        "#,
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let mut registry = HandlerRegistry::new();
    registry.register_agent("counter", move |_: &ValueMap| -> anyhow::Result<ValueMap> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(ValueMap::new())
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    );

    assert!(matches!(
        result,
        Err(LabelflowError::CircularDependency { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_dependency_is_rejected_before_any_step_runs() {
    let workflow = yaml(
        r#"
        name: dangling
        steps:
          - name: A
            agent: noop
            depends_on: [ghost]
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("noop", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(ValueMap::new())
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    );

    assert!(matches!(
        result,
        Err(LabelflowError::UnknownDependency { ref step, ref dependency })
            if step == "A" && dependency == "ghost"
    ));
}

#[test]
fn undeclared_handler_is_rejected_before_any_step_runs() {
    let workflow = yaml(
        r#"
        name: missing_handler
        steps:
          - name: A
            agent: registered
          - name: B
            agent: unregistered
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("registered", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        panic!("pre-flight must reject the workflow before dispatch")
    });

    let result = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    );

    assert!(matches!(
        result,
        Err(LabelflowError::UnknownHandler { ref name, .. }) if name == "unregistered"
    ));
}

#[test]
fn execution_order_is_deterministic_across_runs() {
    let workflow = yaml(
        r#"
        name: determinism
        steps:
          - name: z
            agent: noop
          - name: a
            agent: noop
          - name: m
            agent: noop
            depends_on: [z]
          - name: b
            agent: noop
            depends_on: [a, m]
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("noop", |_: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(ValueMap::new())
    });

    let first = run_workflow(
        &workflow,
        &HashMap::new(),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    for _ in 0..5 {
        let next = run_workflow(
            &workflow,
            &HashMap::new(),
            &registry,
            &RunOptions::default(),
        )
        .unwrap();
        assert_eq!(next.order, first.order);
    }

    // Ready steps run in declaration order: z before a.
    let pos = |s: &str| first.order.iter().position(|x| x == s).unwrap();
    assert!(pos("z") < pos("a"));
    assert!(pos("m") < pos("b"));
}

#[test]
fn actions_and_agents_mix_in_one_workflow() {
    use labelflow::handlers::{register_labellerr_actions, LabellerrClient};

    struct FakePlatform;
    impl LabellerrClient for FakePlatform {
        fn push_preannotations(
            &self,
            _project_id: &str,
            _annotation_format: &str,
            _annotation_file: Option<&str>,
        ) -> anyhow::Result<serde_json::Value> {
            Ok(json!({"upload_id": "up-9"}))
        }

        fn pull_annotations(
            &self,
            project_id: &str,
            _export_config: &ValueMap,
        ) -> anyhow::Result<serde_json::Value> {
            Ok(json!({"export_id": format!("ex-{}", project_id)}))
        }
    }

    let workflow = yaml(
        r#"
        name: labeling_pipeline
        steps:
          - name: pull
            action: pull_from_labellerr
            parameters:
              project_id: "{{ env.PROJECT_ID }}"
          - name: relabel
            agent: echo
            parameters:
              export: "{{ pull.export.export_id }}"
            depends_on: [pull]
          - name: push
            action: push_to_labellerr
            parameters:
              project_id: "{{ env.PROJECT_ID }}"
            depends_on: [relabel]
        "#,
    );

    let mut registry = HandlerRegistry::new();
    registry.register_agent("echo", |params: &ValueMap| -> anyhow::Result<ValueMap> {
        Ok(params.clone())
    });
    register_labellerr_actions(&mut registry, Arc::new(FakePlatform));

    let result = run_workflow(
        &workflow,
        &env(&[("PROJECT_ID", "proj-3")]),
        &registry,
        &RunOptions::default(),
    )
    .unwrap();

    assert!(result.success);
    assert_eq!(
        result.step("relabel").unwrap().output["export"],
        json!("ex-proj-3")
    );
    assert_eq!(result.step("push").unwrap().output["status"], json!("pushed"));
}
