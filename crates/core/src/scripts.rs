//! Page functions evaluated inside the portal's documents.
//!
//! Each function takes a single JSON argument and returns plain JSON.

use crate::driver::Script;

/// Rows of the multi-result listing: `[{ index, patid, text }]`.
pub const LISTING_ROWS: Script = Script {
	name: "listing_rows",
	source: r#"({ limit }) =>
	Array.from(document.querySelectorAll('#search-patients-data-table tr.search-patients-div-row'))
		.slice(0, limit)
		.map((row, index) => ({
			index,
			patid: row.getAttribute('patid'),
			text: (row.textContent || '').trim().substring(0, 100),
		}))"#,
};

/// Header fields of the patient overview: `{ patientName, lastVisit, provider }`.
pub const PATIENT_DETAILS: Script = Script {
	name: "patient_details",
	source: r#"() => {
	const text = (sel) => document.querySelector(sel)?.textContent?.trim() || null;
	const label = Array.from(document.querySelectorAll('span')).find((el) => el.textContent.includes('Last Visit'));
	return {
		patientName: text('.patient-name'),
		lastVisit: label?.nextElementSibling?.textContent?.trim() || null,
		provider: text('.label-inner-value[title*="DDS"], .label-inner-value[title*="DMD"]'),
	};
}"#,
};

/// Every dated treatment-plan row: `[{ date, description }]`. Filtering happens on our side.
pub const TREATMENT_ROWS: Script = Script {
	name: "treatment_rows",
	source: r#"() => {
	const rows = [];
	for (const row of document.querySelectorAll('#treatmentplan-data-table-body tr')) {
		const date = row.querySelector('a.diag-date');
		const description = row.querySelector('td.width-23.text-ellipsis');
		if (date && description) {
			rows.push({ date: date.textContent.trim(), description: description.textContent.trim() });
		}
	}
	return rows;
}"#,
};

/// Init script that hides the given overlay selectors before any page script runs.
pub fn overlay_hiding_script(selectors: &[String]) -> String {
	let rules: String = selectors
		.iter()
		.map(|sel| format!("{sel} {{ display: none !important; pointer-events: none !important; }}\n"))
		.collect();
	let css = serde_json::to_string(&rules).unwrap_or_else(|_| "\"\"".into());
	format!(
		"(() => {{\n\tconst install = () => {{\n\t\tconst style = document.createElement('style');\n\t\tstyle.textContent = {css};\n\t\t(document.head || document.documentElement).appendChild(style);\n\t}};\n\tif (document.documentElement) install(); else document.addEventListener('DOMContentLoaded', install);\n}})();"
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overlay_script_embeds_escaped_rules() {
		let script = overlay_hiding_script(&["#overlay-menubar".into(), ".ui-widget-overlay".into()]);
		assert!(script.contains("#overlay-menubar { display: none !important;"));
		assert!(script.contains(".ui-widget-overlay"));
		assert!(script.contains("\\n"));
	}
}
