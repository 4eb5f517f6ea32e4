pub const SUMMARIZE: &str = "请为以下内容生成一个简洁的摘要，不超过150字：

内容：
{content}

要求：
1. 提取关键信息和要点
2. 语言简洁明了
3. 适合在笔记应用中阅读
4. 保持原文的主要观点
5. 只返回摘要本身";

pub const OPTIMIZE_TITLE: &str = "请为以下内容优化标题，使其更适合在flomo或备忘录应用中使用：

原标题：{title}

内容概述：{content}

要求：
1. 标题应该简洁有力，不超过30个字符
2. 能够准确概括内容主题
3. 适合在移动设备上阅读
4. 避免过于营销化的词汇
5. 只返回优化后的标题，不要其他内容";

pub const CATEGORIZE: &str = r#"请分析以下内容并提供分类和标签：

内容：{content}

请只返回如下格式的JSON：
{"contentType": "article|video|image|tutorial|review|news|recipe|travel|lifestyle|technology|entertainment|other", "categories": ["主要分类1", "主要分类2"], "tags": ["标签1", "标签2", "标签3"]}

要求：
1. contentType从给定类型中选择最合适的一个
2. categories不超过2个，代表主要分类
3. tags不超过5个，代表具体标签
4. 使用中文"#;

pub const EXTRACT_HTML: &str = r#"请从以下HTML内容中提取结构化信息：

HTML内容：
{html}

URL：{url}

请只返回如下格式的JSON：
{"title": "页面标题", "content": "主要内容文本", "images": ["图片URL1", "图片URL2"], "author": "作者或null", "publishedAt": "发布时间或null"}

要求：
1. 提取最重要的内容文本
2. 过滤掉广告、导航等无关内容
3. 图片URL应该是完整的URL
4. 如果某项信息不存在，返回null"#;

/// Fills `{name}` slots in `template`.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}
