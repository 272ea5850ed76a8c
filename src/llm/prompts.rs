//! Default prompts.

/// Summarize one company source page.
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"You are researching the company "{company}" for a job application.

Below is the visible text of its {source}. Summarize what the company does, who its customers are, its size and stage, notable products or recent news, and anything it says about its mission, values or culture. Ignore navigation, cookie banners and legal boilerplate.

Page text:
{content}

Respond with ONLY a factual summary of 4-6 sentences. No formatting or preamble. If the text says nothing useful about the company, respond with an empty line."#;

/// Write a cover email from job details, research and resume.
pub const DEFAULT_DRAFT_PROMPT: &str = r#"You are a professional writer helping me write a cover email for a job application.

JOB DETAILS:
{job_details}

COMPANY RESEARCH:
{company_research}

MY RESUME:
{resume}

TASK:
Write a personalized cover email that shows real interest in this role and company, connects the most relevant experience from my resume to the job, and refers to concrete details from the company research. Keep it to two or three short paragraphs in a professional but warm tone, and end with a clear call to action.

Format the answer exactly as:

Subject: <subject line>

<email body>"#;
