//! Oracle prompts for each phase. Every prompt asks for a single JSON object.

use serde_json::{json, Value};

use crate::model::{FilterElement, FilterKind};

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn keywords(guidance: &str) -> String {
    format!(
        r#"你是一个专业的网页表单填充助手。请根据目标企业画像，生成 3-10 个最相关的搜索关键词，并说明理由。
这些关键词将填入企业高级搜索页面的“输入关键词”输入框。

**目标企业画像:** "{guidance}"

请只返回如下 JSON：
{{
    "reason": "简要说明为什么选择这些关键词",
    "keywords": "关键词1、关键词2、关键词3"
}}
keywords 为一个字符串，多个词用顿号分隔。"#
    )
}

pub fn regions(guidance: &str) -> String {
    format!(
        r#"你是一个专业的企业搜索助手。请根据目标企业画像，判断是否需要限定具体的中国行政区域（省份、直辖市、城市）。

**目标企业画像:** "{guidance}"

请只返回如下 JSON：
{{
    "reason": "需要或不需要限定地区的理由",
    "regions": ["广东省", "广州市"]
}}
regions 使用中文行政区划全称。如果不需要限定，regions 返回空数组 []。"#
    )
}

pub fn checkboxes(guidance: &str, elements: &[FilterElement]) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for element in elements.iter().filter(|e| e.kind == FilterKind::Checkbox) {
        match groups.iter_mut().find(|(category, _)| *category == element.category) {
            Some((_, labels)) => labels.push(&element.label),
            None => groups.push((&element.category, vec![&element.label])),
        }
    }
    let form = groups
        .iter()
        .map(|(category, labels)| format!("【{category}】: {}", labels.join(" | ")))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"你是一个网页自动化助手兼企业画像专家。请根据目标企业画像，从下面的企业筛选条件中找出所有需要勾选的复选框。

**目标企业画像:** "{guidance}"

**筛选条件（大类及其可选项）:**
{form}

返回的 JSON 中 decision 的结构与上面的大类一致，但只包含需要勾选的选项，选项文本必须与列表中的完全一致。
对于“无失信被执行人”“无被执行人”“无限制高消费”“无行政处罚”“无环保处罚”等选项，如果画像表明企业存在对应情况，则不要勾选。

请只返回如下 JSON：
{{
    "reason": "简要说明选择这些条件的依据",
    "decision": {{
        "登记状态": ["存续", "在业"],
        "注册资本": ["1000万以上"]
    }}
}}"#
    )
}

pub fn multi_selects(guidance: &str, menus: &[FilterElement]) -> String {
    let listing: Vec<Value> = menus
        .iter()
        .enumerate()
        .map(|(id, menu)| {
            json!({
                "id": id,
                "category": menu.category,
                "menu": menu.label,
                "options": menu.choice_texts(),
            })
        })
        .collect();
    format!(
        r#"你是一个企业筛选专家。请根据目标企业画像，从以下多选下拉菜单中选择需要勾选的选项。

**目标企业画像:** "{guidance}"

**待选菜单列表:**
{}

请只返回如下 JSON：
{{
    "decisions": [
        {{ "id": <菜单 id，整数>, "selected_options": ["<选项1>", "<选项2>"] }}
    ]
}}
selected_options 必须是 options 中精确存在的字符串；不需要勾选的菜单不要列出。"#,
        pretty(&Value::Array(listing))
    )
}

pub fn dropdowns(guidance: &str, menus: &[FilterElement]) -> String {
    let listing: Vec<Value> = menus
        .iter()
        .enumerate()
        .map(|(id, menu)| match menu.kind {
            FilterKind::DropdownGrouped => json!({
                "id": id,
                "category": menu.category,
                "title": menu.label,
                "type": "radio",
                "options": menu.choices.iter().map(|choice| json!({
                    "choice": choice.text,
                    "group": choice.group_title,
                    "group_index": choice.group_index,
                    "choice_index": choice.choice_index,
                })).collect::<Vec<_>>(),
            }),
            _ => json!({
                "id": id,
                "category": menu.category,
                "title": menu.label,
                "type": "normal",
                "options": menu.choice_texts(),
            }),
        })
        .collect();
    format!(
        r#"你是一个网页自动化助手兼企业画像专家。请根据目标企业画像，决定以下下拉菜单需要选择的选项。

**目标企业画像:** "{guidance}"

**下拉菜单列表（radio 类型的每个选项带有 group_index 和 choice_index）:**
{}

请只返回如下 JSON，并按菜单的 type 放入对应的数组：
{{
    "reason": "简要说明下拉菜单的选择依据",
    "normal_dropdown_selections": [
        {{ "id": <菜单 id>, "selection": "<选项文本>" }}
    ],
    "radio_dropdown_selections": [
        {{ "id": <菜单 id>, "selections": [ {{ "choice": "<选项文本>", "group_index": <int>, "choice_index": <int> }} ] }}
    ]
}}
group_index 与 choice_index 从 0 开始。只选“不限”或不需要选择的菜单不要列出。"#,
        pretty(&Value::Array(listing))
    )
}

pub fn taxonomy_top_level(guidance: &str, categories: &[String]) -> String {
    format!(
        r#"你是一个企业画像分析专家。请根据目标企业画像，从以下【行业大类】列表中选出最可能包含目标企业的大类。

**目标企业画像:** "{guidance}"

**行业大类列表:**
{}

请只返回如下 JSON：
{{
    "reason": "分析理由",
    "selected_categories": ["制造业"]
}}
如果均不相关，selected_categories 返回空数组 []。"#,
        pretty(&json!(categories))
    )
}

pub fn taxonomy_batch(guidance: &str, category: &str, options: &[String]) -> String {
    format!(
        r#"你是一个行业细分专家。目标是在大类“{category}”下，精确勾选符合画像的细分行业。

**目标企业画像:** "{guidance}"

**待选细分行业列表:**
{}

请只返回如下 JSON：
{{
    "reason": "简要理由",
    "selected_nodes": ["细分行业A", "细分行业B"]
}}
selected_nodes 必须与列表中的文本完全一致；本批次无相关行业时返回 []。"#,
        options.join("\n")
    )
}
