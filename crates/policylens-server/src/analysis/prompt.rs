//! Prompt templates for policy report generation

/// System instruction for all report completions
pub const ANALYST_SYSTEM: &str = "You are an expert insurance policy analyst. \
Provide detailed, thorough analysis of insurance policies.";

/// Prompt builder for analysis and comparison reports
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the full analysis prompt around the extracted policy text
    pub fn analysis_prompt(policy_text: &str) -> String {
        format!(
            r#"You are an expert insurance policy analyst. Analyze the provided insurance policy document and provide a comprehensive, detailed report in Markdown format.

Please examine the document thoroughly and provide a well-structured Markdown report that includes:

1. **Executive Summary**: A comprehensive high-level overview of the policy that should be 3-5 paragraphs. Include:
   - Overall policy purpose and type
   - Key features and notable aspects
   - Most important coverage highlights
   - Any critical information policyholders should know upfront

2. **Key Terms & Conditions**: Extract and summarize important terms including:
   - Deductibles (amounts and types)
   - Coverage limits (per category and aggregate)
   - Premium amounts and payment terms
   - Policy period dates
   - Renewal terms

3. **Coverage Details**: Detailed breakdown of what is covered, including:
   - Types of coverage (property, liability, etc.)
   - Coverage amounts and limits
   - Specific protections and benefits
   - Any special endorsements or riders

4. **Exclusions**: List all exclusions, limitations, and what is NOT covered:
   - Common exclusions
   - Specific policy exclusions
   - Any conditions that void coverage

5. **Premiums & Payment Information**:
   - Premium amounts (annual, monthly, etc.)
   - Payment schedule
   - Payment methods accepted
   - Late payment terms

6. **Potential Issues & Concerns**: Identify any:
   - Hidden clauses or fine print
   - Coverage gaps that policyholders should be aware of
   - Unusual terms or conditions
   - Areas where the policy might be insufficient

7. **Roofing & Siding Analysis** (if applicable): If this is a property insurance policy, analyze:
   - Roof coverage specifics
   - Siding coverage details
   - Any special conditions or limitations for these items

8. **Recommendations**: Provide actionable recommendations for the policyholder regarding:
   - Areas to review carefully
   - Questions to ask their agent
   - Potential improvements or additional coverage to consider

**IMPORTANT**:
- Format your entire response as a well-structured Markdown document. Use proper Markdown syntax including:
  - Headers (##, ###) for section titles
  - **Bold** for important terms
  - Bullet points (-) for lists
  - Tables where appropriate
  - Clear section breaks
- DO NOT wrap your response in code blocks (do not use triple backticks with markdown or any other language identifier)
- Return the markdown directly as plain text, not inside a code fence

Be thorough but concise, and focus on actionable insights that help the policyholder understand their coverage.

---

Insurance Policy Document:

{policy_text}"#
        )
    }

    /// Build the prompt comparing two previously generated policy reports
    pub fn comparison_prompt(previous_report: &str, new_report: &str) -> String {
        format!(
            r#"You are comparing two insurance policy analysis reports for the same policyholder: a previous policy and its renewal or replacement.

Produce a Markdown report describing what changed between the two policies. Cover:

1. **Summary of Changes**: 2-3 paragraphs describing the most significant differences.
2. **Coverage Changes**: coverage added, removed, or with changed limits.
3. **Premium & Deductible Changes**: any cost differences.
4. **Exclusion Changes**: new or removed exclusions.
5. **Recommendations**: what the policyholder should verify with their agent.

After the report, append a fenced ```json block containing an object with the keys
"coverage_changes", "premium_changes", and "exclusion_changes", each an array of
short change descriptions. The JSON block is machine-read; keep it valid.

---

Previous Policy Report:

{previous_report}

---

New Policy Report:

{new_report}"#
        )
    }

    /// Strip a markdown code-fence wrapper the model sometimes adds despite
    /// instructions
    pub fn strip_code_fence(text: &str) -> String {
        let trimmed = text.trim();

        if !trimmed.starts_with("```") {
            return trimmed.to_string();
        }

        // Drop the opening fence line (``` or ```markdown etc.)
        let body = match trimmed.split_once('\n') {
            Some((_, rest)) => rest,
            None => return String::new(),
        };

        let body = body.trim_end();
        let body = body.strip_suffix("```").unwrap_or(body);

        body.trim().to_string()
    }

    /// Pull the trailing ```json block out of a comparison report, if present
    pub fn extract_json_block(text: &str) -> Option<serde_json::Value> {
        let start = text.rfind("```json")?;
        let after = &text[start + "```json".len()..];
        let end = after.find("```")?;

        serde_json::from_str(after[..end].trim()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_embeds_document() {
        let prompt = PromptBuilder::analysis_prompt("POLICY TEXT HERE");
        assert!(prompt.contains("Executive Summary"));
        assert!(prompt.contains("Roofing & Siding Analysis"));
        assert!(prompt.ends_with("POLICY TEXT HERE"));
    }

    #[test]
    fn test_strip_markdown_fence() {
        let wrapped = "```markdown\n# Report\n\nBody text\n```";
        assert_eq!(PromptBuilder::strip_code_fence(wrapped), "# Report\n\nBody text");
    }

    #[test]
    fn test_strip_generic_fence() {
        let wrapped = "```\n# Report\n```\n";
        assert_eq!(PromptBuilder::strip_code_fence(wrapped), "# Report");
    }

    #[test]
    fn test_unfenced_text_passes_through() {
        let text = "# Report\n\nNo fence here, even though ``` appears inline.";
        assert_eq!(PromptBuilder::strip_code_fence(text), text);
    }

    #[test]
    fn test_extract_json_block() {
        let report = "# Changes\n\nSome prose.\n\n```json\n{\"coverage_changes\": [\"Added flood\"]}\n```";
        let value = PromptBuilder::extract_json_block(report).unwrap();
        assert_eq!(value["coverage_changes"][0], "Added flood");
    }

    #[test]
    fn test_extract_json_block_missing() {
        assert!(PromptBuilder::extract_json_block("no json here").is_none());
        assert!(PromptBuilder::extract_json_block("```json\nnot valid\n```").is_none());
    }
}
