// Prompt Templates
// `{key}` placeholders are filled by `fill`; other braces are left alone.

pub const DISCOVERY: &str = r#"You are an edtech venture scout.
Using the request and the search results below, list {count_instruction} promising edtech startups.

Request: {query}

Search results:
{results}

Reply with a JSON array only, no commentary:
[
  {
    "name": "company name",
    "domain": "K-12 / higher education / corporate learning / ...",
    "description": "one or two sentences",
    "market": "target market (country or segment)",
    "founded_year": "year or Unknown",
    "funding_stage": "Seed/Series A/B/C/IPO/Unknown"
  }
]"#;

pub const TECH_SUMMARY: &str = r#"You are a technology analyst.
Summarize the technology of the startup below.

Startup:
{startup_info}

Reply with JSON only:
{
  "summary": "core technology in 2-3 sentences",
  "highlights": ["technical strength 1", "technical strength 2"],
  "gaps": ["area needing work 1", "area needing work 2"]
}"#;

pub const MARKET_CLASSIFY: &str = r#"You classify market analysis requests.
Decide for the request below:
1. query_type: main interest (market_size, trend, competition, forecast, general)
2. needs_web_search: whether recent data is required (true/false)
3. analysis_depth: required depth (basic, intermediate, advanced)

Request: {query}

Reply with JSON only:
{"query_type": "...", "needs_web_search": true, "analysis_depth": "..."}"#;

pub const MARKET_SIZE: &str = r#"As a market sizing expert, analyze the market size from the information below.

Query: {query}

Internal data:
{rag_data}

External data:
{web_data}

Cover:
1. Current market size (amount and unit)
2. Growth over the last 3-5 years
3. Share of the main segments
4. Regional distribution (if relevant)

Be concise and quantitative."#;

pub const MARKET_GROWTH: &str = r#"As a growth trend analyst, analyze the market's growth from the information below.

Query: {query}

Internal data:
{rag_data}

External data:
{web_data}

Cover:
1. Five-year outlook (CAGR)
2. Main growth drivers (technology, regulation, consumer behaviour)
3. Market maturity (introduction/growth/maturity/decline)
4. Recent trends and innovations

Include concrete figures and evidence."#;

pub const MARKET_COMPETITION: &str = r#"As a competition analyst, analyze the competitive landscape from the information below.

Query: {query}

Internal data:
{rag_data}

External data:
{web_data}

Cover:
1. Main competitors and market shares
2. Market concentration (HHI or CRn if available)
3. Barriers to entry (high/medium/low) and why
4. Intensity of competition

Use Porter's Five Forces where helpful."#;

pub const MARKET_RISKS: &str = r#"As a risk analyst, identify the main risk factors from the analyses below.

Market: {query}

Market size analysis:
{market_size}

Growth analysis:
{growth_trend}

Competition analysis:
{competition}

Rate each of these as high/medium/low with a reason, one per line:
- Market risk (demand volatility, economic sensitivity)
- Technology risk (technology shifts, substitutes)
- Regulatory risk (law and policy changes)
- Competition risk (new entrants, price pressure)"#;

pub const MARKET_SCORE: &str = r#"You are a market attractiveness assessor. Score the market objectively:
- market_size_score: 0-25 (larger market scores higher)
- growth_score: 0-30 (faster growth scores higher)
- competition_score: 0-25 (weaker competition scores higher)
- risk_score: 0-20 (lower risk scores higher)
- total_score: 0-100, the sum of the four

Market: {query}

Market size: {market_size}
Growth: {growth_trend}
Competition: {competition}
Risk factors: {risk_factors}

Reply with JSON only:
{"market_size_score": 0, "growth_score": 0, "competition_score": 0, "risk_score": 0, "total_score": 0, "justification": "..."}"#;

pub const MARKET_REPORT: &str = r#"Write a consolidated market analysis report.

Market: {query}
Analysis depth: {analysis_depth}
Market attractiveness score: {final_score}/100

=== Findings ===

1. Market size
{market_size}

2. Growth
{growth_trend}

3. Competition
{competition}

4. Risk factors
{risk_factors}

=== Structure ===
Write an executive-summary style report with:
1. Key summary (2-3 paragraphs)
2. Opportunity assessment
3. Key success factors
4. Recommendations (entry strategy, cautions)
5. Conclusion

Give clear, actionable insight."#;

pub const COMPETITOR_DISCOVERY: &str = r#"You are an edtech market analyst.
Identify the main competitors of the startup below with a short description of each.

Startup:
{startup_info}

Search results:
{search_results}

Reply with JSON only:
{
  "competitors": [
    {
      "name": "company name",
      "description": "1-2 sentences",
      "category": "B2B/B2C/B2B2C",
      "founded_year": "year",
      "estimated_revenue": "estimate or Unknown",
      "key_products": ["product 1", "product 2"],
      "target_market": "target market",
      "funding_stage": "Seed/Series A/B/C/IPO/Unknown",
      "competitive_overlap": "high/medium/low"
    }
  ]
}"#;

pub const COMPETITOR_ANALYSIS: &str = r#"You are an edtech VC analyst.
Analyze the competitive structure between the startup and its competitors.

Startup:
{startup_info}

Competitors:
{competitors}

Reply with JSON only:
{
  "competition_intensity": 1-10,
  "market_positioning": "Blue Ocean/Red Ocean/Niche Market",
  "differentiation_factors": ["factor 1", "factor 2", "factor 3"],
  "competitive_advantages": ["Technology", "Price", "Network Effect"],
  "entry_barriers": "high/medium/low",
  "key_threats": ["threat 1", "threat 2"],
  "market_share_potential": 1-10
}"#;

pub const COMPETITOR_POSITIONING: &str = r#"You are a competitive strategy expert.
Assess the startup's competitive positioning.

Startup name: {startup_name}
Competitors: {competitors}
Competitive structure: {analysis}

Reply with JSON only:
{
  "positioning_score": 0-10,
  "differentiation_score": 0-10,
  "competitive_moat": {"technology": 0-10, "brand": 0-10, "network_effect": 0-10, "data": 0-10, "overall": 0-10},
  "sustainability": {"score": 0-10, "reasoning": "why"},
  "recommendations": ["recommendation 1", "recommendation 2"]
}"#;

pub const INVESTMENT_SCORING: &str = r#"You are an edtech VC investment analyst.
Combine the information below into per-category scores and a total.

Startup:
{startup_info}
Technology summary:
{tech_summary}
Market analysis:
{market_analysis}
Competitor analysis:
{competitor_analysis}
Competitive positioning:
{competitive_positioning}

Reply with JSON only:
{
  "scores": {
    "educational_efficacy": {"subtotal": 0-25, "max": 25},
    "market_traction": {"subtotal": 0-20, "max": 20},
    "team": {"subtotal": 0-20, "max": 20},
    "technology": {"subtotal": 0-15, "max": 15},
    "business_model": {"subtotal": 0-10, "max": 10},
    "competition": {"subtotal": 0-5, "max": 5},
    "compliance": {"subtotal": 0-5, "max": 5}
  },
  "total_score": 0-100,
  "percentile_rank": "top X%"
}"#;

pub const INVESTMENT_RISK: &str = r#"You are a risk analyst.
Assess the investment risks of the startup below.

Startup:
{startup_info}
Investment scores:
{scores}
Competitor analysis:
{competitor_analysis}

Reply with JSON only (level 1-10, likelihood and impact low/medium/high):
{
  "market_risk": {"level": 1, "likelihood": "...", "impact": "..."},
  "technology_risk": {"level": 1, "likelihood": "...", "impact": "..."},
  "execution_risk": {"level": 1, "likelihood": "...", "impact": "..."},
  "financial_risk": {"level": 1, "likelihood": "...", "impact": "..."},
  "competition_risk": {"level": 1, "likelihood": "...", "impact": "..."},
  "regulatory_risk": {"level": 1, "likelihood": "...", "impact": "..."},
  "overall_risk_score": 1-10
}"#;

pub const INVESTMENT_DECISION: &str = r#"You chair the investment committee.
Make the final investment decision.

Startup name: {startup_name}
Total score: {total_score}
Risk assessment: {risk_assessment}
Rule-based initial recommendation: {initial_recommendation}

"decision" must be one of: Invest, Strong Buy, Buy, Hold, Watch, Pass.

Reply with JSON only:
{
  "decision": "...",
  "confidence": "high/medium/low",
  "key_strengths": ["strength 1", "strength 2"],
  "key_concerns": ["concern 1", "concern 2"],
  "investment_thesis": "2-3 sentences",
  "recommended_actions": ["action 1", "action 2"],
  "valuation_suggestion": "suggested valuation",
  "expected_return": "expected return over 3-5 years",
  "exit_strategy": "exit strategy"
}"#;

pub const REPORT_SUMMARY: &str = r#"You are an investment memo editor creating one-page summaries for edtech startups. Use the supplied data only. Reply in English. Paragraphs must be 2-3 sentences (max 350 characters) and bullet points under 70 characters each.
Return a JSON object with keys:
{
  "executive_summary": "short paragraph",
  "technology": {"paragraph": "...", "bullets": []},
  "market_competition": {"paragraph": "...", "bullets": []},
  "risk": {"paragraph": "...", "bullets": []},
  "investment": {"paragraph": "...", "bullets": []},
  "headline_points": []
}
Each bullet array holds up to 3 concise items. No extra fields or commentary.

Company name: {company_name}
Technology summary: {tech_summary}
Technology highlights: {tech_highlights}
Technology gaps: {tech_gaps}
Market summary: {market_summary}
Market analysis detail: {market_analysis}
Competitor insights: {competitor_info}
Investment decision: {decision}
Investment rationale: {decision_reason}
Investment scores: {scores}
Risk assessment: {risks}
Key metrics: score={score}, confidence={confidence}, overall_risk={overall_risk}"#;

/// Replaces each `{key}` in `template` with its value.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}
