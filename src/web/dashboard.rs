use actix_web::{HttpResponse, Responder, get};

// -------------------------
// Tiny HTML dashboard
// -------------------------

#[get("/")]
pub(super) async fn dashboard() -> impl Responder {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/html; charset=utf-8"))
        .body(PAGE)
}

const PAGE: &str = r#"
<!doctype html>
<html lang="en" class="dark">
<head>
  <meta charset="utf-8" />
  <title>Marketplace Harvest</title>

  <!-- Tailwind (CDN) -->
  <script>
    tailwind.config = { darkMode: 'class' };
  </script>
  <script src="https://cdn.tailwindcss.com"></script>

  <!-- Alpine.js (CDN) -->
  <script defer src="https://unpkg.com/alpinejs@3.x.x/dist/cdn.min.js"></script>

  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <style>[x-cloak]{display:none!important}</style>
</head>
<body class="bg-slate-900 text-slate-100 antialiased">
  <main class="max-w-6xl mx-auto p-6 flex flex-col gap-6 h-dvh"
        x-data="harvest()"
        x-init="init()">

    <div>
      <h1 class="text-3xl font-bold tracking-tight">Marketplace Harvest</h1>
      <p class="text-sm text-slate-400">Find products in your city and filter by price.</p>
    </div>

    <!-- Form -->
    <form @submit.prevent="add()"
          class="bg-slate-800 shadow-sm ring-1 ring-slate-700 rounded-xl p-4 space-y-4 shrink-0">
      <div class="grid grid-cols-1 md:grid-cols-4 gap-3 items-center">
        <label class="text-sm font-medium text-slate-300">City</label>
        <input x-model="form.city" type="text" placeholder="Enter city name..."
               class="w-full rounded-lg border-slate-700 bg-slate-900 px-2 py-1.5 text-sm">
        <label class="text-sm font-medium text-slate-300">Product</label>
        <input x-model="form.product" type="text" placeholder="What are you looking for?"
               class="w-full rounded-lg border-slate-700 bg-slate-900 px-2 py-1.5 text-sm">

        <label class="text-sm font-medium text-slate-300">Minimum price</label>
        <input x-model.number="form.min_price" type="number" min="0" step="1"
               class="w-full rounded-lg border-slate-700 bg-slate-900 px-2 py-1.5 text-sm">
        <label class="text-sm font-medium text-slate-300">Maximum price</label>
        <input x-model.number="form.max_price" type="number" min="0" step="1"
               class="w-full rounded-lg border-slate-700 bg-slate-900 px-2 py-1.5 text-sm">

        <label class="text-sm font-medium text-slate-300">Region code</label>
        <input x-model="form.region_code" type="text" placeholder="Enter region code..."
               class="w-full rounded-lg border-slate-700 bg-slate-900 px-2 py-1.5 text-sm">
        <label class="text-sm font-medium text-slate-300 flex items-center gap-2">
          <input x-model="form.match_exact" type="checkbox" class="rounded"> Exact match
        </label>
        <div></div>
      </div>
      <div class="flex items-center gap-3">
        <button type="submit"
                class="px-2 py-1 text-sm rounded-md bg-emerald-600 text-white font-medium hover:bg-emerald-700">Add</button>
        <button type="button" @click="run()" :disabled="isRunning || configs.length === 0"
                class="px-2 py-1 text-sm rounded-md bg-indigo-600 text-white font-medium hover:bg-indigo-700 disabled:opacity-50 disabled:cursor-not-allowed">
          <span x-text="isRunning ? 'Running…' : 'Scrape Data'"></span>
        </button>
        <a x-show="downloadReady" x-cloak href="/api/results/download"
           class="px-2 py-1 text-sm rounded-md bg-slate-700 text-slate-100 font-medium hover:bg-slate-600">Download All Results</a>
        <span class="text-sm" :class="flash.ok ? 'text-emerald-400' : 'text-rose-400'" x-text="flash.msg"></span>
      </div>
    </form>

    <!-- Current marketplaces -->
    <div x-show="configs.length" x-cloak
         class="bg-slate-800 shadow-sm ring-1 ring-slate-700 rounded-xl p-4 shrink-0">
      <div class="text-sm font-semibold text-slate-300 mb-2">Current marketplaces</div>
      <table class="min-w-full text-sm">
        <tbody>
          <template x-for="c in configs" :key="c.index">
            <tr class="border-t border-slate-700">
              <td class="px-3 py-1" x-text="c.city"></td>
              <td class="px-3 py-1" x-text="c.product"></td>
              <td class="px-3 py-1 tabular-nums" x-text="c.min_price"></td>
              <td class="px-3 py-1 tabular-nums" x-text="c.max_price"></td>
              <td class="px-3 py-1" x-text="c.region_code"></td>
              <td class="px-3 py-1" x-text="c.match_exact ? 'exact' : 'partial'"></td>
              <td class="px-3 py-1 text-right">
                <button @click="remove(c.index)" :disabled="isRunning"
                        class="text-xs px-2 py-1 rounded-md bg-rose-700 hover:bg-rose-600">Remove</button>
              </td>
            </tr>
          </template>
        </tbody>
      </table>
    </div>

    <!-- Log (collapsed by default) -->
    <div class="bg-slate-800 shadow-sm ring-1 ring-slate-700 rounded-xl p-4 shrink-0">
      <div class="flex items-center justify-between">
        <div class="text-sm font-semibold text-slate-300">Log</div>
        <div class="text-sm text-slate-300 flex gap-4">
          <div><span class="font-semibold">Marketplaces done:</span> <span x-text="stats.done"></span></div>
          <div><span class="font-semibold">Rows:</span> <span x-text="rows.length"></span></div>
        </div>
        <button @click="logOpen = !logOpen"
                class="text-xs px-2 py-1 rounded-md bg-slate-700 text-slate-100 hover:bg-slate-600">
          <span x-text="logOpen ? 'Hide' : 'Show'"></span>
        </button>
      </div>
      <div x-show="logOpen" x-cloak class="mt-2">
        <pre id="log"
             class="h-36 overflow-auto whitespace-pre-wrap text-sm leading-relaxed text-slate-200 bg-slate-900/40 rounded-md p-2"
             x-text="logs.join('\n')"></pre>
      </div>
    </div>

    <!-- Results -->
    <div class="bg-slate-800 shadow-sm ring-1 ring-slate-700 rounded-xl p-4 flex-1 min-h-0 flex flex-col">
      <div class="text-sm font-semibold text-slate-300 mb-2">Combined match results</div>
      <div class="flex-1 min-h-0 overflow-y-auto rounded-lg">
        <table class="min-w-full text-sm">
          <thead class="bg-slate-700 sticky top-0 z-10">
            <tr class="text-left text-slate-100">
              <th class="px-3 py-2 font-medium">#</th>
              <th class="px-3 py-2 font-medium">Title</th>
              <th class="px-3 py-2 font-medium">Price</th>
              <th class="px-3 py-2 font-medium">Shown as</th>
              <th class="px-3 py-2 font-medium">Location</th>
              <th class="px-3 py-2 font-medium">URL</th>
            </tr>
          </thead>
          <tbody>
            <template x-for="(row, i) in rows" :key="i">
              <tr class="border-t border-slate-700 hover:bg-slate-700/50">
                <td class="px-3 py-2" x-text="i + 1"></td>
                <td class="px-3 py-2"><span class="line-clamp-2" x-text="row.title"></span></td>
                <td class="px-3 py-2 tabular-nums" x-text="row.price ?? ''"></td>
                <td class="px-3 py-2" x-text="row.price_raw ?? ''"></td>
                <td class="px-3 py-2" x-text="row.location"></td>
                <td class="px-3 py-2">
                  <a class="text-indigo-400 hover:underline" :href="row.url" target="_blank">open</a>
                </td>
              </tr>
            </template>
          </tbody>
        </table>
      </div>
    </div>
  </main>

  <script>
    function harvest() {
      return {
        form: { city: '', product: '', min_price: 0, max_price: 1000, region_code: '', match_exact: true },
        configs: [],
        rows: [],
        logs: [],
        stats: { done: 0 },
        flash: { ok: true, msg: '' },
        isRunning: false,
        downloadReady: false,
        logOpen: false,
        _es: null,

        async init() {
          await this.refresh();
          const r = await fetch('/api/results');
          if (r.ok) {
            const data = await r.json().catch(() => ({}));
            this.rows = data.rows || [];
            this.downloadReady = this.rows.length > 0;
          }
        },
        log(msg) {
          this.logs.push(msg);
          this.$nextTick(() => {
            const el = document.getElementById('log');
            if (el) el.scrollTop = el.scrollHeight;
          });
        },
        say(ok, msg) { this.flash = { ok, msg }; },

        async refresh() {
          const r = await fetch('/api/configs');
          if (r.ok) this.configs = (await r.json()).configs;
        },
        async add() {
          const r = await fetch('/api/configs', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify(this.form),
          });
          const data = await r.json().catch(() => ({}));
          if (r.ok) { this.configs = data.configs; this.say(true, 'Marketplace added successfully!'); }
          else { this.say(false, data.error || 'Please fill all fields correctly.'); }
        },
        async remove(index) {
          const r = await fetch(`/api/configs/${index}`, { method: 'DELETE' });
          const data = await r.json().catch(() => ({}));
          if (r.ok) { this.configs = data.configs; } else { this.say(false, data.error); }
        },

        run() {
          if (this._es) { try { this._es.close(); } catch (_) {} this._es = null; }
          this.rows = [];
          this.logs = [];
          this.stats = { done: 0 };
          this.downloadReady = false;
          this.say(true, '');
          this.isRunning = true;

          const es = new EventSource('/api/run/stream');
          this._es = es;
          const finish = () => { this.isRunning = false; es.close(); this._es = null; };

          es.addEventListener('start', (ev) => this.log(`START: ${ev.data}`));
          es.addEventListener('progress', (ev) => this.log(JSON.parse(ev.data).message));
          es.addEventListener('config', (ev) => {
            const d = JSON.parse(ev.data);
            this.stats.done += 1;
            this.log(`${d.city} / ${d.product}: ${d.rows} rows from ${d.raw_items} items`);
          });
          es.addEventListener('done', (ev) => {
            const d = JSON.parse(ev.data);
            this.rows = d.rows || [];
            this.downloadReady = this.rows.length > 0;
            this.log(`DONE: ${JSON.stringify(d.summary)}`);
            if (!this.rows.length) this.say(false, 'No listings found.');
            finish();
          });
          es.addEventListener('error', (ev) => {
            let msg = '(connection error)';
            try { msg = JSON.parse(ev.data).error; } catch (_) {}
            this.log(`ERROR: ${msg}`);
            this.say(false, msg);
            finish();
          });
        },
      }
    }
  </script>
</body>
</html>
"#;
