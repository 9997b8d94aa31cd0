//! DOM helpers evaluated in an isolated world of the target frame.

use crate::driver::Script;

pub(super) const ELEMENT_STATE: Script = Script {
	name: "element_state",
	source: r#"({ selector, state }) => {
	const el = document.querySelector(selector);
	const visible = (node) => {
		if (!node) return false;
		const style = getComputedStyle(node);
		if (style.visibility === 'hidden' || style.display === 'none') return false;
		const rect = node.getBoundingClientRect();
		return rect.width > 0 && rect.height > 0;
	};
	if (state === 'attached') return !!el;
	if (state === 'visible') return Array.from(document.querySelectorAll(selector)).some(visible);
	return !Array.from(document.querySelectorAll(selector)).some(visible);
}"#,
};

pub(super) const COUNT: Script = Script {
	name: "count",
	source: r#"({ selector }) => document.querySelectorAll(selector).length"#,
};

pub(super) const TEXT: Script = Script {
	name: "text",
	source: r#"({ selector, index }) => {
	const el = document.querySelectorAll(selector)[index];
	if (!el) throw new Error(`no element #${index} for ${selector}`);
	return el.innerText ?? el.textContent ?? '';
}"#,
};

pub(super) const ATTRIBUTE: Script = Script {
	name: "attribute",
	source: r#"({ selector, index, name }) => {
	const el = document.querySelectorAll(selector)[index];
	if (!el) throw new Error(`no element #${index} for ${selector}`);
	return el.getAttribute(name);
}"#,
};

pub(super) const CLICK: Script = Script {
	name: "click",
	source: r#"({ selector, index }) => {
	const el = document.querySelectorAll(selector)[index];
	if (!el) throw new Error(`no element #${index} for ${selector}`);
	el.scrollIntoView({ block: 'center', inline: 'center' });
	for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup']) {
		el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, view: window }));
	}
	el.click();
	return true;
}"#,
};

pub(super) const FILL: Script = Script {
	name: "fill",
	source: r#"({ selector, value }) => {
	const el = document.querySelector(selector);
	if (!el) throw new Error(`no element for ${selector}`);
	el.focus();
	const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
	const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set;
	if (setter) setter.call(el, value); else el.value = value;
	el.dispatchEvent(new Event('input', { bubbles: true }));
	el.dispatchEvent(new Event('change', { bubbles: true }));
	return true;
}"#,
};
