mod common;

use std::sync::Arc;

use common::*;
use screening_pipeline::{
    progress_channel, render_readable, CacheStore, FilterElement, FilterKind, Choice,
    ProgressDrain, ProgressMessage, ScreeningTool, NEWLINE_TOKEN, REASON_TOKEN,
};

const GUIDANCE: &str = "广东的海鲜批发企业，正常经营";

fn checkbox_form() -> FakeForm {
    let mut form = FakeForm::new();
    form.region_titles = vec!["广东省".into(), "广州市".into()];
    form.checkboxes = vec![
        FilterElement::checkbox("登记状态", "存续", false),
        FilterElement::checkbox("登记状态", "注销", false),
        FilterElement::checkbox("企业类型", "有限责任公司", false),
    ];
    form
}

async fn drain(
    pipeline: screening_pipeline::ScreeningPipeline,
) -> (Vec<ProgressMessage>, Option<String>) {
    let (tx, rx) = progress_channel(1024);
    let task = tokio::spawn(async move { ScreeningTool::run(&pipeline, GUIDANCE.into(), tx).await });
    let mut drain = ProgressDrain::new(rx, task);
    let mut messages = Vec::new();
    while let Some(message) = drain.next_message().await {
        messages.push(message);
    }
    let result = drain.finish().await.unwrap();
    (messages, result)
}

fn report_of(messages: &[ProgressMessage]) -> Option<String> {
    messages
        .iter()
        .find_map(|m| m.final_report().map(str::to_string))
}

#[tokio::test]
async fn province_guidance_selects_region_and_keywords() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(
        PromptBackend::new()
            .reply(KEYWORDS, r#"{"reason":"主营业务","keywords":"海鲜批发、水产品"}"#)
            .reply(REGIONS, r#"```json
{"reason":"画像限定广东","regions":["广东省"]}
```"#),
    );
    let form = checkbox_form();
    let events = form.events.clone();
    let pipeline = pipeline(form, backend, CacheStore::new(dir.path()));

    let (messages, result) = drain(pipeline).await;
    let report = result.expect("report");
    assert_eq!(report_of(&messages).as_deref(), Some(report.as_str()));

    let readable = render_readable(&report);
    assert!(readable.contains("Keywords: “海鲜批发”、“水产品” [rationale: 主营业务]"));
    assert!(readable.contains("Regions: “广东省” [rationale: 画像限定广东]"));

    let log = events.lock().unwrap().clone();
    assert!(log.contains(&"fill 海鲜批发、水产品".to_string()));
    assert!(log.iter().any(|e| e.starts_with("region 广东")));
    assert_eq!(log.first().map(String::as_str), Some("open"));
    assert_eq!(log.last().map(String::as_str), Some("close"));
    assert!(log.contains(&"confirm".to_string()));

    assert!(messages
        .iter()
        .any(|m| matches!(m, ProgressMessage::Screenshot(_))));
}

#[tokio::test]
async fn checkbox_without_reason_gets_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(PromptBackend::new().reply(
        CHECKBOXES,
        r#"{"decision":{"登记状态":["存续","不存在的选项"]}}"#,
    ));
    let form = checkbox_form();
    let events = form.events.clone();
    let pipeline = pipeline(form, backend, CacheStore::new(dir.path()));

    let (_, result) = drain(pipeline).await;
    let report = result.unwrap();

    let lines: Vec<&str> = report.split(NEWLINE_TOKEN).collect();
    assert!(lines.contains(&format!("登记状态: checked “存续”{REASON_TOKEN}(no reason given)").as_str()));
    assert!(!report.contains("不存在的选项"));
    assert!(!report.contains("Keywords:"));
    assert!(events
        .lock()
        .unwrap()
        .contains(&"check 登记状态/存续".to_string()));
}

#[tokio::test]
async fn menus_apply_only_known_options() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(
        PromptBackend::new()
            .reply(
                MULTI,
                r#"{"decisions":[{"id":"0","selected_options":["批发","虚构"]},{"id":7,"selected_options":["x"]}]}"#,
            )
            .reply(
                DROPDOWNS,
                r#"{"reason":"规模适中","normal_dropdown_selections":[{"id":0,"selection":"100-499人"}],"radio_dropdown_selections":[{"id":1,"selections":[{"choice":"1-5年","group_index":0,"choice_index":1}]}]}"#,
            ),
    );
    let mut form = FakeForm::new();
    form.multi_selects = vec![FilterElement::menu(
        FilterKind::MultiSelect,
        "经营范围",
        "主营类型",
        vec![Choice::plain("批发", 0), Choice::plain("零售", 1)],
        0,
    )];
    form.dropdowns = vec![
        FilterElement::menu(
            FilterKind::DropdownFlat,
            "企业规模",
            "参保人数",
            vec![Choice::plain("不限", 0), Choice::plain("100-499人", 1)],
            0,
        ),
        FilterElement::menu(
            FilterKind::DropdownGrouped,
            "企业规模",
            "成立年限",
            vec![
                Choice::grouped("1年内", 0, "年限", 0),
                Choice::grouped("1-5年", 0, "年限", 1),
            ],
            1,
        ),
    ];
    let events = form.events.clone();
    let pipeline = pipeline(form, backend, CacheStore::new(dir.path()));

    let (_, result) = drain(pipeline).await;
    let readable = render_readable(&result.unwrap());

    assert!(readable.contains("经营范围:"));
    assert!(readable.contains("1、主营类型: selected “批发”"));
    assert!(readable.contains("企业规模:"));
    assert!(readable.contains("1、参保人数: selected “100-499人”"));
    assert!(readable.contains("2、成立年限: selected “1-5年”"));
    assert!(!readable.contains("虚构"));

    let log = events.lock().unwrap().clone();
    assert!(log.contains(&"multi 主营类型 批发".to_string()));
    assert!(log.contains(&"flat 参保人数 100-499人".to_string()));
    assert!(log.contains(&"grouped 成立年限 [(0, 1)]".to_string()));
}

#[tokio::test]
async fn taxonomy_is_batched_and_drops_unknown_labels() {
    let dir = tempfile::tempdir().unwrap();
    let mut nodes = vec![node("批发和零售业", 0, "批发和零售业", true)];
    for i in 0..649 {
        nodes.push(node(&format!("批发细类{i}"), 1, "批发和零售业", false));
    }
    nodes.push(node("制造业", 0, "制造业", true));
    nodes.push(node("食品制造", 1, "制造业", false));

    let backend = Arc::new(
        PromptBackend::new()
            .reply(
                TOP_LEVEL,
                r#"{"reason":"贸易类","selected_categories":["批发和零售业","虚构大类"]}"#,
            )
            .rule(|prompt: &str| {
                if !prompt.contains(BATCH) {
                    return None;
                }
                if prompt.contains("批发细类10\n") {
                    Some(r#"{"reason":"海鲜","selected_nodes":["批发细类10","幻觉行业"]}"#.into())
                } else {
                    Some(r#"{"selected_nodes":[]}"#.into())
                }
            }),
    );
    let mut form = FakeForm::new();
    form.taxonomy = Some(nodes);
    form.expand_batches = vec![3, 2];
    let events = form.events.clone();
    let pipeline = pipeline(form, backend.clone(), CacheStore::new(dir.path()));

    let (_, result) = drain(pipeline).await;
    let readable = render_readable(&result.unwrap());

    // 650 selectable options under the chosen category: ceil(650 / 300) calls.
    assert_eq!(backend.prompts_containing(BATCH).len(), 3);
    assert!(readable.contains("Industries: “批发细类10”"));
    assert!(readable.contains("[top level] 贸易类；[批发和零售业] 海鲜"));
    assert!(!readable.contains("幻觉行业"));

    let log = events.lock().unwrap().clone();
    assert!(log.contains(&"expand 3".to_string()));
    assert!(log.contains(&"expand 0".to_string()));
    assert!(log.contains(&"taxonomy 批发细类10".to_string()));

    assert!(dir.path().join("taxonomy/top_level_categories.json").exists());
    assert!(dir.path().join("taxonomy/批发和零售业.json").exists());
}

#[tokio::test]
async fn second_run_reuses_cached_collections() {
    let dir = tempfile::tempdir().unwrap();
    let mut form = checkbox_form();
    form.taxonomy = Some(vec![
        node("制造业", 0, "制造业", true),
        node("食品制造", 1, "制造业", false),
    ]);
    let backend = Arc::new(
        PromptBackend::new()
            .reply(CHECKBOXES, r#"{"reason":"正常经营","decision":{"登记状态":"存续"}}"#)
            .reply(TOP_LEVEL, r#"{"selected_categories":["制造业"]}"#)
            .reply(BATCH, r#"{"selected_nodes":["食品制造"]}"#),
    );

    let first = form.clone();
    let first_events = first.events.clone();
    let (_, report) = drain(pipeline(first, backend.clone(), CacheStore::new(dir.path()))).await;
    assert!(report.unwrap().contains("食品制造"));
    assert!(first_events
        .lock()
        .unwrap()
        .contains(&"collect checkboxes".to_string()));

    let mut second = form.clone();
    second.events = Default::default();
    let second_events = second.events.clone();
    let (_, report) = drain(pipeline(second, backend, CacheStore::new(dir.path()))).await;
    let report = report.unwrap();
    assert!(report.contains("登记状态: checked “存续”"));
    assert!(report.contains("食品制造"));

    let log = second_events.lock().unwrap().clone();
    assert!(!log.contains(&"collect checkboxes".to_string()));
    assert!(!log.contains(&"collect taxonomy".to_string()));
    // Collections that came back empty were not cached.
    assert!(log.contains(&"collect multi".to_string()));
}

#[tokio::test]
async fn fatal_open_failure_reports_error_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut form = FakeForm::new();
    form.fail_open = true;
    let backend = Arc::new(PromptBackend::new());
    let pipeline = pipeline(form, backend.clone(), CacheStore::new(dir.path()));

    let (messages, result) = drain(pipeline).await;
    assert!(result.is_none());
    assert!(report_of(&messages).is_none());
    let error = messages
        .iter()
        .find(|m| matches!(m, ProgressMessage::Error(_)))
        .expect("error message");
    assert!(error.to_line().starts_with("❌ Error: "));
    assert!(error.to_line().contains("ERR_CONNECTION_REFUSED"));
    assert!(backend.prompts_containing("").is_empty());
}

#[tokio::test]
async fn unavailable_taxonomy_still_finalizes() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(
        PromptBackend::new().reply(REGIONS, r#"{"reason":"限定广州","regions":"广州市"}"#),
    );
    let form = checkbox_form();
    let events = form.events.clone();
    let pipeline = pipeline(form, backend.clone(), CacheStore::new(dir.path()));

    let (messages, result) = drain(pipeline).await;
    let report = result.unwrap();
    assert!(report.contains("Regions: “广州市”"));
    assert!(!report.contains("Industries:"));
    assert!(backend.prompts_containing(TOP_LEVEL).is_empty());
    assert!(events.lock().unwrap().contains(&"confirm".to_string()));
    assert!(messages.iter().any(|m| m.final_report().is_some()));
}

#[tokio::test]
async fn malformed_replies_skip_phases() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(
        PromptBackend::new()
            .reply(KEYWORDS, "I cannot help with that")
            .reply(REGIONS, ""),
    );
    let form = checkbox_form();
    let events = form.events.clone();
    let pipeline = pipeline(form, backend, CacheStore::new(dir.path()));

    let (_, result) = drain(pipeline).await;
    let report = result.unwrap();
    assert!(report.is_empty());
    let log = events.lock().unwrap().clone();
    assert!(!log.iter().any(|e| e.starts_with("fill")));
    assert!(!log.iter().any(|e| e.starts_with("region")));
}
