//! Built in overlay graphics.

pub const HAT_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="600" height="360" viewBox="0 0 600 360">
  <defs>
    <filter id="s" x="-20%" y="-20%" width="140%" height="140%">
      <feDropShadow dx="0" dy="6" stdDeviation="8" flood-opacity="0.25"/>
    </filter>
  </defs>
  <g filter="url(#s)">
    <path d="M80 290c70 30 370 30 440 0 0 35-120 70-220 70S80 325 80 290z" fill="#111"/>
    <path d="M170 290c0-70 55-190 130-190s130 120 130 190" fill="#111"/>
    <rect x="150" y="235" width="300" height="45" rx="18" fill="#2b6cb0"/>
  </g>
</svg>"##;

pub const GLASSES_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="700" height="240" viewBox="0 0 700 240">
  <defs>
    <filter id="s" x="-20%" y="-20%" width="140%" height="140%">
      <feDropShadow dx="0" dy="6" stdDeviation="6" flood-opacity="0.25"/>
    </filter>
  </defs>
  <g filter="url(#s)" fill="none" stroke="#111" stroke-width="18" stroke-linecap="round" stroke-linejoin="round">
    <rect x="40" y="60" width="250" height="140" rx="60"/>
    <rect x="410" y="60" width="250" height="140" rx="60"/>
    <path d="M290 130h120"/>
  </g>
  <g opacity="0.12">
    <rect x="55" y="75" width="220" height="110" rx="50" fill="#111"/>
    <rect x="425" y="75" width="220" height="110" rx="50" fill="#111"/>
  </g>
</svg>"##;

pub const MUSTACHE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="500" height="220" viewBox="0 0 500 220">
  <defs>
    <filter id="s" x="-20%" y="-20%" width="140%" height="140%">
      <feDropShadow dx="0" dy="6" stdDeviation="7" flood-opacity="0.25"/>
    </filter>
  </defs>
  <g filter="url(#s)" fill="#111">
    <path d="M250 130c-35 0-55-25-75-25-25 0-40 20-70 20-35 0-70-25-70-55 0-22 15-40 40-45 25-5 55 10 80 25 25 15 40 25 95 25 55 0 70-10 95-25 25-15 55-30 80-25 25 5 40 23 40 45 0 30-35 55-70 55-30 0-45-20-70-20-20 0-40 25-75 25z"/>
  </g>
</svg>"##;

pub const MASK_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="360" viewBox="0 0 800 360">
  <defs>
    <filter id="s" x="-20%" y="-20%" width="140%" height="140%">
      <feDropShadow dx="0" dy="8" stdDeviation="10" flood-opacity="0.25"/>
    </filter>
    <linearGradient id="g" x1="0" y1="0" x2="1" y2="0">
      <stop offset="0" stop-color="#7c3aed"/>
      <stop offset="0.5" stop-color="#06b6d4"/>
      <stop offset="1" stop-color="#f59e0b"/>
    </linearGradient>
  </defs>
  <g filter="url(#s)">
    <path d="M90 190c0-70 75-130 170-145 60-10 140-10 200 0 95 15 170 75 170 145 0 60-45 105-115 125-75 22-165 32-255 32s-180-10-255-32C135 295 90 250 90 190z" fill="url(#g)"/>
    <g fill="#000" opacity="0.22">
      <path d="M220 205c0-35 28-62 64-62 40 0 72 28 72 62 0 34-32 58-72 58-36 0-64-23-64-58z"/>
      <path d="M444 205c0-35 28-62 64-62 40 0 72 28 72 62 0 34-32 58-72 58-36 0-64-23-64-58z"/>
    </g>
    <path d="M90 190c0-70 75-130 170-145 60-10 140-10 200 0 95 15 170 75 170 145 0 60-45 105-115 125-75 22-165 32-255 32s-180-10-255-32C135 295 90 250 90 190z" fill="none" stroke="#111" stroke-width="14" stroke-linejoin="round"/>
    <path d="M378 196c22-18 48-18 70 0" fill="none" stroke="#111" stroke-width="14" stroke-linecap="round"/>
    <g fill="#fff" opacity="0.85">
      <circle cx="160" cy="210" r="10"/>
      <circle cx="620" cy="210" r="10"/>
      <circle cx="190" cy="255" r="8"/>
      <circle cx="590" cy="255" r="8"/>
      <circle cx="400" cy="285" r="6"/>
    </g>
    <path d="M120 210c-60 20-95 45-110 78" fill="none" stroke="#111" stroke-width="14" stroke-linecap="round"/>
    <path d="M680 210c60 20 95 45 110 78" fill="none" stroke="#111" stroke-width="14" stroke-linecap="round"/>
  </g>
</svg>"##;

pub const LOGO_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="160" viewBox="0 0 400 160">
  <rect x="6" y="6" width="388" height="148" rx="28" fill="#111" stroke="#fff" stroke-width="6"/>
  <circle cx="80" cy="80" r="44" fill="#f59e0b"/>
  <circle cx="66" cy="70" r="7" fill="#111"/>
  <circle cx="94" cy="70" r="7" fill="#111"/>
  <path d="M58 94c12 14 32 14 44 0" fill="none" stroke="#111" stroke-width="7" stroke-linecap="round"/>
  <rect x="150" y="48" width="210" height="22" rx="11" fill="#06b6d4"/>
  <rect x="150" y="90" width="150" height="22" rx="11" fill="#7c3aed"/>
</svg>"##;
